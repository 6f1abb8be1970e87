use flagtree::{Command, Parser};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub schema: String,
    pub command: String,
    pub commands: usize,
    pub flags: usize,
    pub positionals: usize,
    pub max_depth: usize,
}

impl CheckReport {
    /// Counts exclude the built-in help/version flags.
    pub fn new(schema: &str, parser: &Parser) -> Self {
        let root = parser.root();
        let mut report = CheckReport {
            schema: schema.to_string(),
            command: root.get_name().to_string(),
            commands: 0,
            flags: 0,
            positionals: 0,
            max_depth: 0,
        };
        walk(root, 0, &mut report);
        report
    }
}

fn walk(cmd: &Command, depth: usize, report: &mut CheckReport) {
    report.max_depth = report.max_depth.max(depth);
    report.flags += cmd
        .flags()
        .iter()
        .filter(|f| !f.is_builtin())
        .count();
    report.positionals += cmd.get_positionals().len();
    for child in cmd.get_subcommands() {
        report.commands += 1;
        walk(child, depth + 1, report);
    }
}
