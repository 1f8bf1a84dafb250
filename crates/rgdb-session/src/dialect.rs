use std::sync::LazyLock;

use regex::Regex;

use crate::Command;

/// Markers of a yes/no confirmation question.
const GDB_CONFIRMATION_MARKERS: [&str; 2] = ["(y or n)", "(y or [n])"];
const LLDB_CONFIRMATION_MARKERS: [&str; 3] = ["(y or n)", "(y or [n])", "[Y/n]"];

static GDB_LINE_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"Line (\d+) of"));
static GDB_LOCATION_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"Located in (.*)"));
static GDB_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"(?m)^#0\s+(?:0x[0-9a-fA-F]+ in )?([^\s(]+) \("));

static LLDB_LINE_RE: LazyLock<Regex> = LazyLock::new(|| regex(r"frame #0: .* at [^\s:]+:(\d+)"));
static LLDB_LOCATION_RE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"LineEntry: \[[^\]]*\): (.+?):\d+"));
static LLDB_FUNCTION_RE: LazyLock<Regex> =
    LazyLock::new(|| regex(r"frame #0: \S+ [^`\s]+`([^\s(]+)"));

#[allow(clippy::expect_used)] // patterns are compile-time constants
fn regex(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

/// Command syntax spoken by the debugger backend of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dialect {
    /// GNU debugger (primary dialect).
    Gdb,

    /// LLVM debugger (alternate dialect).
    Lldb,
}

impl Dialect {
    /// Selects the dialect from the kernel name of the debuggee's host (as
    /// reported by `uname`).
    pub fn from_uname(uname: &str) -> Self {
        if uname.trim() == "Darwin" {
            Self::Lldb
        } else {
            Self::Gdb
        }
    }

    /// Name of the debugger program.
    pub const fn program(self) -> &'static str {
        match self {
            Self::Gdb => "gdb",
            Self::Lldb => "lldb",
        }
    }

    /// Marker printed by the debugger when it is ready for a new command.
    pub const fn prompt_marker(self) -> &'static str {
        match self {
            Self::Gdb => "(gdb)",
            Self::Lldb => "(lldb)",
        }
    }

    /// Markers of a yes/no confirmation question.
    pub const fn confirmation_markers(self) -> &'static [&'static str] {
        match self {
            Self::Gdb => &GDB_CONFIRMATION_MARKERS,
            Self::Lldb => &LLDB_CONFIRMATION_MARKERS,
        }
    }

    /// Commands to issue once the debugger shows its first prompt.
    pub const fn setup_commands(self) -> &'static [&'static str] {
        match self {
            // software watchpoints only
            Self::Gdb => &["set can-use-hw-watchpoints 0", "set pagination off"],
            Self::Lldb => &[],
        }
    }

    /// Command enabling execution recording (for reverse debugging), if the
    /// dialect supports it.
    pub fn record_command(self) -> Option<Command> {
        match self {
            Self::Gdb => Some(Command::new(["target", "record-full"])),
            Self::Lldb => None,
        }
    }

    /// Query for the current line, and the pattern capturing its number.
    pub fn line_query(self) -> (Command, &'static Regex) {
        match self {
            Self::Gdb => (Command::new(["info", "line"]), &GDB_LINE_RE),
            Self::Lldb => (Command::new(["frame", "info"]), &LLDB_LINE_RE),
        }
    }

    /// Query for the current source file, and the pattern capturing its path.
    pub fn location_query(self) -> (Command, &'static Regex) {
        match self {
            Self::Gdb => (Command::new(["info", "source"]), &GDB_LOCATION_RE),
            Self::Lldb => (
                Command::new(["image", "lookup", "-v", "--address", "$pc"]),
                &LLDB_LOCATION_RE,
            ),
        }
    }

    /// Query for the current frame, and the pattern capturing its function.
    pub fn function_query(self) -> (Command, &'static Regex) {
        match self {
            Self::Gdb => (Command::new(["frame"]), &GDB_FUNCTION_RE),
            Self::Lldb => (Command::new(["frame", "info"]), &LLDB_FUNCTION_RE),
        }
    }

    /// Rewrites a canonical command into this dialect's syntax.
    ///
    /// Canonical commands are gdb commands, so this is the identity for
    /// [Dialect::Gdb].
    pub fn translate(self, command: &Command) -> Command {
        match self {
            Self::Gdb => command.clone(),
            Self::Lldb => translate_to_lldb(command),
        }
    }
}

fn translate_to_lldb(command: &Command) -> Command {
    let tokens = command.tokens();
    let after_verb = tokens.get(1..).unwrap_or_default();
    let after_subcommand = tokens.get(2..).unwrap_or_default();

    match (command.verb(), command.arg(0)) {
        ("break", _) => rewrite(&["b"], after_verb),
        ("run", _) => rewrite(&["r"], after_verb),
        ("attach", Some(pid)) if !pid.is_empty() && pid.bytes().all(|b| b.is_ascii_digit()) => {
            rewrite(&["attach", "-p"], after_verb)
        }
        ("nexti", _) => rewrite(&["ni"], after_verb),
        ("stepi", _) => rewrite(&["si"], after_verb),
        ("return", _) => rewrite(&["thread", "return"], after_verb),
        ("info", Some("break")) => rewrite(&["br", "l"], after_subcommand),
        ("info", Some("registers")) => rewrite(&["register", "read"], after_subcommand),
        ("delete", _) => rewrite(&["br", "del"], after_verb),
        ("watch", _) => rewrite(&["watchpoint", "set", "variable"], after_verb),
        ("x", Some(addr)) => {
            let addr = format!("`{addr}`");
            rewrite(&["memory", "read", addr.as_str()], after_subcommand)
        }
        ("disassemble", _) => rewrite(&["disassemble", "--frame"], after_verb),
        ("inspect", _) => rewrite(&["p"], after_verb),
        _ => command.clone(),
    }
}

fn rewrite(head: &[&str], tail: &[String]) -> Command {
    Command::new(
        head.iter()
            .map(|token| (*token).to_owned())
            .chain(tail.iter().cloned()),
    )
}

#[cfg(test)]
mod tests {
    use super::Dialect;
    use crate::Command;

    fn lldb(line: &str) -> String {
        let command = Command::parse(line).expect("command");
        Dialect::Lldb.translate(&command).to_string()
    }

    #[test]
    fn dialect_from_uname() {
        assert_eq!(Dialect::from_uname("Darwin\n"), Dialect::Lldb);
        assert_eq!(Dialect::from_uname("Linux"), Dialect::Gdb);
        assert_eq!(Dialect::from_uname(""), Dialect::Gdb);
    }

    #[test]
    fn gdb_is_identity() {
        for line in ["break main", "run &>/tmp/x", "x 0x1000", "info break"] {
            let command = Command::parse(line).expect("command");
            assert_eq!(Dialect::Gdb.translate(&command), command);
        }
    }

    #[test]
    fn lldb_mapped_verbs() {
        assert_eq!(lldb("break main.c:3"), "b main.c:3");
        assert_eq!(lldb("run &>/tmp/rgdb_out"), "r &>/tmp/rgdb_out");
        assert_eq!(lldb("attach 4242"), "attach -p 4242");
        assert_eq!(lldb("nexti"), "ni");
        assert_eq!(lldb("stepi"), "si");
        assert_eq!(lldb("return"), "thread return");
        assert_eq!(lldb("info break"), "br l");
        assert_eq!(lldb("info registers rip"), "register read rip");
        assert_eq!(lldb("delete 2"), "br del 2");
        assert_eq!(lldb("watch counter"), "watchpoint set variable counter");
        assert_eq!(lldb("x &buf"), "memory read `&buf`");
        assert_eq!(lldb("disassemble"), "disassemble --frame");
        assert_eq!(lldb("inspect argc"), "p argc");
    }

    #[test]
    fn lldb_unmapped_commands_pass_through() {
        for line in [
            "next",
            "continue",
            "print x",
            "attach myprogram",
            "info line",
            "info",
            "x",
            "bt 3",
        ] {
            let command = Command::parse(line).expect("command");
            assert_eq!(Dialect::Lldb.translate(&command), command, "{line}");
        }
    }

    #[test]
    fn translation_leaves_input_untouched() {
        let command = Command::parse("break main").expect("command");
        let _ = Dialect::Lldb.translate(&command);

        assert_eq!(command.to_string(), "break main");
    }

    #[test]
    fn query_patterns() {
        let (_, line_re) = Dialect::Gdb.line_query();
        let caps = line_re
            .captures("Line 12 of \"main.c\" starts at address 0x1139 <main+4>")
            .expect("captures");
        assert_eq!(&caps[1], "12");

        let (_, location_re) = Dialect::Gdb.location_query();
        let caps = location_re
            .captures("Current source file is main.c\nLocated in /src/app/main.c\r\n")
            .expect("captures");
        assert_eq!(caps[1].trim(), "/src/app/main.c");

        let (_, function_re) = Dialect::Gdb.function_query();
        let caps = function_re
            .captures("#0  compute (x=3) at math.c:7\n7\t  return x * 2;")
            .expect("captures");
        assert_eq!(&caps[1], "compute");

        let (_, line_re) = Dialect::Lldb.line_query();
        let caps = line_re
            .captures("frame #0: 0x0000000100003f64 a.out`main at main.c:5:3")
            .expect("captures");
        assert_eq!(&caps[1], "5");

        let (_, location_re) = Dialect::Lldb.location_query();
        let caps = location_re
            .captures("      LineEntry: [0x0000000100003f64-0x0000000100003f70): /Users/me/main.c:5:3")
            .expect("captures");
        assert_eq!(&caps[1], "/Users/me/main.c");

        let (_, function_re) = Dialect::Lldb.function_query();
        let caps = function_re
            .captures("frame #0: 0x0000000100003f64 a.out`main at main.c:5:3")
            .expect("captures");
        assert_eq!(&caps[1], "main");
    }
}
