#![allow(missing_docs)]
#![allow(clippy::print_stderr)]

use std::io::Write;
use std::path::{Path, PathBuf};

use miette::IntoDiagnostic;

use rand::Rng;

use rgdb_cli::{CliOpts, CliTarget, Console, Repl, Settings, VIEWER_PORTS};

use rgdb_session::transport::{
    LocalTransport, RemoteHost, RemoteOptions, RemoteTransport, Transport,
};
use rgdb_session::{FileLocator, LocationNotifier, Session, TagIndex};

use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use tracing_subscriber::EnvFilter;

fn main() {
    let cli = CliOpts::parse_from_cmdline();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_env_var("RGDB_LOG")
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let res = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .into_diagnostic()
        .and_then(|runtime| {
            let res = evaluate(cli, &runtime);

            // the standard input reader may still be blocked
            runtime.shutdown_background();

            res
        });

    if let Err(e) = res {
        eprintln!("{e:?}");
        std::process::exit(1);
    }
}

fn evaluate(cli: CliOpts, runtime: &Runtime) -> miette::Result<()> {
    let (transport, host, args) = connect(&cli)?;

    let cancel = CancellationToken::new();
    let events = rgdb_cli::spawn_input_tasks(runtime.handle(), cancel.clone());
    let mut console = Console::new(events, std::io::stdout());

    let settings_path = Settings::default_path()
        .ok_or_else(|| miette::miette!("cannot determine the configuration directory"))?;
    let settings = Settings::load_or_bootstrap(&settings_path, &mut console)?;

    let code_path = cli
        .code_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(&settings.code_path));
    let tags_file = cli
        .tags_file
        .clone()
        .or_else(|| settings.tags_file().map(Path::to_path_buf));

    let mut locator = FileLocator::new(code_path);
    if let Some(tags_file) = tags_file {
        match TagIndex::load(&tags_file) {
            Ok(tags) => locator = locator.with_tags(tags),
            Err(e) => tracing::warn!(error = %e, path = %tags_file.display(), "tag file ignored"),
        }
    }

    let session = Session::start(transport, &args, cancel).into_diagnostic()?;
    let binary = session.binary().unwrap_or("<unknown>").to_owned();

    let port = match cli.ui_port {
        Some(port) => port,
        None => {
            let port = rand::thread_rng().gen_range(VIEWER_PORTS);
            rgdb_cli::launch_viewer(&cli.ui, port, &format!("rgdb {binary} (Editor)"))
                .into_diagnostic()?;
            port
        }
    };
    let link = rgdb_cli::connect_viewer(port, runtime.handle()).into_diagnostic()?;

    writeln!(console.out(), "Debugging {binary} on {host}").into_diagnostic()?;

    Repl::new(session, console, locator, LocationNotifier::new(link))
        .with_reverse(cli.reverse || settings.reverse)
        .run()
        .into_diagnostic()
}

/// Opens the transport to the debuggee's host, and returns it along with the
/// host name and the debugger arguments.
fn connect(cli: &CliOpts) -> miette::Result<(Box<dyn Transport>, String, Vec<String>)> {
    match cli.target().into_diagnostic()? {
        CliTarget::Local { args } => Ok((
            Box::new(LocalTransport::new()),
            "localhost".to_owned(),
            args,
        )),
        CliTarget::Remote { host, args } => {
            let options = RemoteOptions {
                host: host.clone(),
                port: cli.port,
                user: cli.user_name().into_diagnostic()?,
                password: cli.password.clone(),
            };

            let remote =
                RemoteHost::connect(&options, rgdb_cli::prompt_password).into_diagnostic()?;

            Ok((Box::new(RemoteTransport::new(remote)), host, args))
        }
    }
}
