use crate::command::{Command, command_at};
use crate::error::{Error, Result};
use crate::flag::Flag;
use crate::group::Group;
use crate::help;
use crate::matches::Matches;
use crate::options::ParserOptions;
use crate::registry::RegistryTree;
use crate::session::Session;
use crate::value::Value;

const HELP_ID: &str = "__help";
const VERSION_ID: &str = "__version";
const HELP_GROUP: &str = "Help Options";

/// Owns a validated command tree and parses argument vectors against it.
///
/// Every parse resets the tree first, so a parser can be reused. Values are
/// read back through [`Parser::matches`] or the tree accessors.
///
/// ```
/// use flagtree::{Command, Flag, Parser, ValueKind};
///
/// let app = Command::new("app")
///     .flag(Flag::new("verbose").short('v').long("verbose"))
///     .flag(Flag::new("out").short('o').long("out").kind(ValueKind::String));
/// let mut parser = Parser::new(app).unwrap();
///
/// let rest = parser.parse(["-vo", "out.txt", "input"]).unwrap();
/// assert_eq!(rest, vec!["input".to_string()]);
///
/// let m = parser.matches();
/// assert!(m.get_bool("verbose"));
/// assert_eq!(m.get_str("out"), Some("out.txt"));
/// ```
#[derive(Debug, Clone)]
pub struct Parser {
    root: Command,
    options: ParserOptions,
    registries: RegistryTree,
    active: Vec<usize>,
    rest: Vec<String>,
}

impl Parser {
    pub fn new(root: Command) -> Result<Self> {
        Self::with_options(root, ParserOptions::default())
    }

    /// Validate `root` and index its names. Every schema problem surfaces
    /// here as [`crate::ErrorKind::InvalidSchema`], before any token is seen.
    pub fn with_options(mut root: Command, options: ParserOptions) -> Result<Self> {
        root.prepare(&options.namespace_delimiter);
        install_builtins(&mut root, &options);
        root.prepare(&options.namespace_delimiter);

        root.validate(&options)?;
        let registries = RegistryTree::build(&root, &options)?;
        root.reset_all(&|_: &str| None)
            .map_err(|e| Error::schema(format!("bad default: {}", e.message())))?;

        tracing::debug!(
            command = root.get_name(),
            commands = root.get_subcommands().len(),
            "parser ready"
        );
        Ok(Self {
            root,
            options,
            registries,
            active: Vec::new(),
            rest: Vec::new(),
        })
    }

    /// Parse `argv` (program name excluded) reading environment-backed flags
    /// from the process environment. Returns the unconsumed tokens.
    pub fn parse<I, S>(&mut self, argv: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let env: Vec<(String, String)> = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        self.parse_with_env(argv, &env)
    }

    /// Parse `argv` with an explicit environment.
    ///
    /// Value precedence is:
    /// 1) argv
    /// 2) env
    /// 3) preset, then declared defaults
    pub fn parse_with_env<I, S>(&mut self, argv: I, env: &[(String, String)]) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let tokens: Vec<String> = argv.into_iter().map(Into::into).collect();
        let lookup = |key: &str| {
            env.iter()
                .find(|(k, _)| k == key)
                .map(|(_, v)| v.as_str())
        };

        let mut session = Session::new(&mut self.root, &self.registries, &self.options, tokens);
        let result = session.run(&lookup);
        self.active = session.into_stack();

        match result {
            Ok(rest) => {
                self.rest = rest.clone();
                Ok(rest)
            }
            Err(err) => {
                self.rest.clear();
                Err(err)
            }
        }
    }

    pub fn root(&self) -> &Command {
        &self.root
    }

    pub fn options(&self) -> &ParserOptions {
        &self.options
    }

    /// Names of the commands entered by the last parse, root first.
    pub fn active_path(&self) -> Vec<&str> {
        (0..=self.active.len())
            .map(|depth| command_at(&self.root, &self.active[..depth]).get_name())
            .collect()
    }

    /// The innermost command entered by the last parse.
    pub fn active_command(&self) -> &Command {
        command_at(&self.root, &self.active)
    }

    /// Resolve a long name (exact, namespaced) the way the last parse would
    /// have: innermost active command first.
    pub fn find_flag_by_long(&self, long: &str) -> Option<&Flag> {
        let key = self.options.normalize(long.trim_start_matches('-'));
        self.registries
            .along(&self.active)
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, reg)| {
                let entry = reg.by_long(&key)?;
                command_at(&self.root, &self.active[..depth]).flag_at(&reg.entry(entry).path)
            })
    }

    pub fn find_flag_by_short(&self, c: char) -> Option<&Flag> {
        self.registries
            .along(&self.active)
            .iter()
            .enumerate()
            .rev()
            .find_map(|(depth, reg)| {
                let entry = reg.by_short(c)?;
                command_at(&self.root, &self.active[..depth]).flag_at(&reg.entry(entry).path)
            })
    }

    /// Current value of a flag (by id) or positional (by name), innermost
    /// active command first.
    pub fn value(&self, id: &str) -> Option<&Value> {
        (0..=self.active.len()).rev().find_map(|depth| {
            let cmd = command_at(&self.root, &self.active[..depth]);
            cmd.find_flag(id)
                .map(Flag::value)
                .or_else(|| cmd.find_positional(id).map(|p| p.value()))
        })
    }

    /// Snapshot of the last parse.
    pub fn matches(&self) -> Matches {
        Matches::collect(&self.root, &self.active, &self.rest)
    }

    /// Unconsumed tokens of the last successful parse.
    pub fn rest(&self) -> &[String] {
        &self.rest
    }

    /// Help for the command entered by the last parse.
    pub fn help(&self) -> String {
        help::render(&self.root, &self.active)
    }

    /// Help for a command path (names or aliases below the root).
    pub fn help_for(&self, path: &[&str]) -> Option<String> {
        let stack = self.root.index_path(path)?;
        Some(help::render(&self.root, &stack))
    }

    pub fn version(&self) -> String {
        help::render_version(&self.root)
    }
}

/// Add `-h/--help` (and `-V/--version` when the root has a version) under
/// a "Help Options" group, using only names the root leaves free.
fn install_builtins(root: &mut Command, options: &ParserOptions) {
    let taken_short = |root: &Command, c: char| root.flags().iter().any(|f| f.get_short() == Some(c));
    let taken_long = |root: &Command, long: &str| {
        let key = options.normalize(long);
        root.flags()
            .iter()
            .filter_map(|f| f.get_qualified_long())
            .any(|l| options.normalize(l) == key)
    };
    let builtin = |root: &Command, id: &str, c: char, long: &str, help: &str| {
        let short = (!taken_short(root, c)).then_some(c);
        let long = (!taken_long(root, long)).then_some(long);
        if short.is_none() && long.is_none() {
            return None;
        }
        let mut flag = Flag::new(id).help(help).builtin();
        if let Some(c) = short {
            flag = flag.short(c);
        }
        if let Some(long) = long {
            flag = flag.long(long);
        }
        Some(flag)
    };

    let mut group = Group::new(HELP_GROUP);
    let mut any = false;
    if options.help_flag {
        if let Some(flag) = builtin(root, HELP_ID, 'h', "help", "Show this help message") {
            group = group.flag(flag.help_trigger(true));
            any = true;
        }
    }
    if !root.get_version().trim().is_empty() {
        if let Some(flag) = builtin(root, VERSION_ID, 'V', "version", "Show version information") {
            group = group.flag(flag.version_trigger(true));
            any = true;
        }
    }
    if any {
        root.push_group(group);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::Positional;
    use crate::error::ErrorKind;
    use crate::value::ValueKind;

    fn parser(cmd: Command) -> Parser {
        Parser::new(cmd).unwrap()
    }

    fn parse_err(parser: &mut Parser, argv: &[&str]) -> Error {
        parser
            .parse_with_env(argv.iter().copied(), &[])
            .unwrap_err()
    }

    fn parse_ok(parser: &mut Parser, argv: &[&str]) -> Vec<String> {
        parser.parse_with_env(argv.iter().copied(), &[]).unwrap()
    }

    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn abc() -> Command {
        Command::new("app")
            .flag(Flag::new("a").short('a'))
            .flag(Flag::new("b").short('b'))
            .flag(Flag::new("c").short('c').kind(ValueKind::String))
    }

    fn app_with_commands() -> Command {
        Command::new("app")
            .flag(Flag::new("verbose").short('v').long("verbose").help("Verbose output"))
            .flag(
                Flag::new("out")
                    .long("out")
                    .kind(ValueKind::String)
                    .value_name("FILE")
                    .help("Output file"),
            )
            .subcommand(
                Command::new("add")
                    .alias("a")
                    .about("Add a file")
                    .flag(
                        Flag::new("force")
                            .short('f')
                            .long("force")
                            .help("Overwrite existing entries"),
                    )
                    .positional(Positional::new("file").help("File to add").required(true)),
            )
            .subcommand(Command::new("remove").about("Remove a file"))
    }

    #[test]
    fn short_clusters_equal_separate_flags() {
        let mut p = parser(abc());
        let mut snapshots = Vec::new();
        for argv in [
            &["-a", "-b", "-c", "val"][..],
            &["-abc", "val"][..],
            &["-abcval"][..],
            &["-ab", "-c=val"][..],
        ] {
            assert!(parse_ok(&mut p, argv).is_empty());
            snapshots.push(p.matches());
        }
        assert!(snapshots.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(snapshots[0].get_str("c"), Some("val"));
        assert!(snapshots[0].get_bool("a"));
    }

    #[test]
    fn long_equals_form_equals_separate_value() {
        let mut p = parser(Command::new("app").flag(Flag::new("out").long("out").kind(ValueKind::String)));
        parse_ok(&mut p, &["--out=x=y"]);
        let joined = p.matches();
        parse_ok(&mut p, &["--out", "x=y"]);
        assert_eq!(joined, p.matches());
        assert_eq!(joined.get_str("out"), Some("x=y"));
    }

    #[test]
    fn reparsing_resets_previous_values() {
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("verbose").short('v'))
                .flag(
                    Flag::new("tag")
                        .long("tag")
                        .kind(ValueKind::list(ValueKind::String)),
                ),
        );
        parse_ok(&mut p, &["-v", "--tag", "a", "--tag", "b"]);
        let first = p.matches();
        parse_ok(&mut p, &["-v", "--tag", "a", "--tag", "b"]);
        assert_eq!(first, p.matches());
        assert_eq!(first.get_all("tag").map(|t| t.len()), Some(2));

        parse_ok(&mut p, &[]);
        let m = p.matches();
        assert!(!m.get_bool("verbose"));
        assert_eq!(m.get_all("tag"), Some(&[][..]));
        assert!(!m.is_explicit("verbose"));
    }

    #[test]
    fn required_flags_are_reported_together() {
        let cmd = || {
            Command::new("app")
                .flag(Flag::new("a").long("a").kind(ValueKind::String).required(true))
                .flag(Flag::new("b").long("b").required(true))
                .flag(Flag::new("c").short('c').required(true))
        };
        let mut p = parser(cmd());
        let err = parse_err(&mut p, &[]);
        assert_eq!(err.kind(), ErrorKind::Required);
        assert_eq!(
            err.message(),
            "the required flags `--a', `--b' and `-c' were not specified"
        );

        let err = parse_err(&mut p, &["--a", "x", "-c"]);
        assert_eq!(err.message(), "the required flag `--b' was not specified");

        // The very last token satisfies a requirement.
        assert!(parse_ok(&mut p, &["-c", "--a", "x", "--b"]).is_empty());
    }

    #[test]
    fn ambiguous_prefix_names_both_candidates() {
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("bar").long("foo-bar"))
                .flag(Flag::new("baz").long("foo-baz")),
        );
        let err = parse_err(&mut p, &["--foo"]);
        assert_eq!(err.kind(), ErrorKind::AmbiguousOption);
        assert_eq!(
            err.message(),
            "ambiguous option `--foo' could match `--foo-bar', `--foo-baz'"
        );
        assert!(parse_ok(&mut p, &["--foo-bar", "--foo-baz"]).is_empty());
    }

    #[test]
    fn unique_prefixes_resolve_unless_disabled() {
        let cmd = || Command::new("app").flag(Flag::new("verbose").long("verbose"));
        let mut p = parser(cmd());
        parse_ok(&mut p, &["--verb"]);
        assert!(p.matches().get_bool("verbose"));

        let mut strict = Parser::with_options(
            cmd(),
            ParserOptions {
                allow_abbreviations: false,
                ..Default::default()
            },
        )
        .unwrap();
        let err = parse_err(&mut strict, &["--verb"]);
        assert_eq!(err.kind(), ErrorKind::UnknownFlag);
        assert_eq!(err.message(), "unknown flag `verb'");
    }

    #[test]
    fn double_dash_disables_options() {
        let mut p = parser(Command::new("app").flag(Flag::new("v").short('v')));
        let rest = parse_ok(&mut p, &["--", "-v", "rest"]);
        assert_eq!(rest, strings(&["-v", "rest"]));
        assert!(!p.matches().get_bool("v"));
        assert_eq!(p.matches().rest(), strings(&["-v", "rest"]).as_slice());
    }

    #[test]
    fn double_dash_fills_positionals_unless_passed_through() {
        let cmd = || Command::new("app").positional(Positional::new("file"));
        let mut p = parser(cmd());
        assert_eq!(parse_ok(&mut p, &["--", "a", "b"]), strings(&["b"]));
        assert_eq!(p.matches().get_str("file"), Some("a"));

        let mut pass = Parser::with_options(
            cmd(),
            ParserOptions {
                pass_double_dash: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(parse_ok(&mut pass, &["--", "a", "b"]), strings(&["a", "b"]));
        assert_eq!(pass.matches().get_str("file"), Some(""));
        assert!(!pass.matches().is_present("file"));

        let mut literal = Parser::with_options(
            cmd(),
            ParserOptions {
                honor_double_dash: false,
                ..Default::default()
            },
        )
        .unwrap();
        parse_ok(&mut literal, &["--"]);
        assert_eq!(literal.matches().get_str("file"), Some("--"));
    }

    #[test]
    fn map_entries_accumulate() {
        let mut p = parser(
            Command::new("app").flag(
                Flag::new("kv")
                    .long("kv")
                    .kind(ValueKind::map(ValueKind::Int)),
            ),
        );
        parse_ok(&mut p, &["--kv", "a:1", "--kv=b:2"]);
        let m = p.matches();
        let map = m.get("kv").and_then(Value::as_map).unwrap();
        assert_eq!(map.get("a"), Some(&Value::Int(1)));
        assert_eq!(map.get("b"), Some(&Value::Int(2)));
        assert_eq!(map.len(), 2);

        let err = parse_err(&mut p, &["--kv", "nope"]);
        assert_eq!(err.kind(), ErrorKind::Marshal);
    }

    #[test]
    fn nested_commands_scope_their_flags() {
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("root-opt").long("opt").kind(ValueKind::String))
                .subcommand(
                    Command::new("sub").flag(Flag::new("sub-opt").long("opt").kind(ValueKind::String)),
                ),
        );
        parse_ok(&mut p, &["--opt", "r", "sub", "--opt", "s"]);
        let m = p.matches();
        assert_eq!(m.get_str("root-opt"), Some("r"));
        let (name, sub) = m.subcommand().unwrap();
        assert_eq!(name, "sub");
        assert_eq!(sub.get_str("sub-opt"), Some("s"));
        assert_eq!(p.active_path(), vec!["app", "sub"]);
        assert_eq!(p.find_flag_by_long("opt").map(Flag::get_id), Some("sub-opt"));
        assert_eq!(p.value("root-opt"), Some(&Value::Str("r".to_string())));

        parse_ok(&mut p, &["sub", "--opt", "s"]);
        assert_eq!(p.matches().get_str("root-opt"), Some(""));
        assert!(!p.matches().is_present("root-opt"));
    }

    #[test]
    fn ancestor_flags_remain_reachable_in_subcommands() {
        let mut p = parser(app_with_commands());
        parse_ok(&mut p, &["add", "-vf", "x.txt"]);
        let m = p.matches();
        assert!(m.get_bool("verbose"));
        let (_, add) = m.subcommand().unwrap();
        assert!(add.get_bool("force"));
        assert_eq!(add.get_str("file"), Some("x.txt"));
        assert_eq!(p.find_flag_by_short('v').map(Flag::get_id), Some("verbose"));
        assert_eq!(p.active_command().get_name(), "add");
    }

    #[test]
    fn help_exits_early_for_the_active_subcommand() {
        let mut p = parser(
            app_with_commands()
                .flag(Flag::new("must").long("must").required(true)),
        );
        let err = parse_err(&mut p, &["add", "-h", "more"]);
        assert_eq!(err.kind(), ErrorKind::Help);
        assert!(err.is_sentinel());
        assert_eq!(Some(err.message().to_string()), p.help_for(&["add"]));
        assert_eq!(err.remaining(), strings(&["more"]).as_slice());
    }

    #[test]
    fn help_commands_render_help_for_the_command_they_sit_under() {
        let help = || Command::new("help").about("Show help").help_trigger(true);
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("must").long("must").required(true))
                .subcommand(
                    Command::new("sub")
                        .flag(Flag::new("force").long("force"))
                        .subcommand(help())
                        .subcommand(Command::new("run")),
                )
                .subcommand(help()),
        );

        let err = parse_err(&mut p, &["sub", "help", "--bogus"]);
        assert_eq!(err.kind(), ErrorKind::Help);
        assert_eq!(Some(err.message().to_string()), p.help_for(&["sub"]));
        assert_eq!(err.remaining(), strings(&["--bogus"]).as_slice());
        assert_eq!(p.active_path(), vec!["app", "sub"]);

        let err = parse_err(&mut p, &["help"]);
        assert_eq!(err.kind(), ErrorKind::Help);
        assert_eq!(Some(err.message().to_string()), p.help_for(&[]));
    }

    #[test]
    fn help_reports_unscanned_tokens() {
        let mut p = parser(Command::new("app").flag(Flag::new("v").short('v')));
        let err = parse_err(&mut p, &["-h", "-v", "rest"]);
        assert_eq!(err.kind(), ErrorKind::Help);
        assert_eq!(err.remaining(), strings(&["-v", "rest"]).as_slice());
    }

    #[test]
    fn root_and_subcommand_help_layout() {
        let p = parser(app_with_commands());
        let expected = "Usage:
  app [OPTIONS] <add | remove>

Application Options:
  -v, --verbose     Verbose output
      --out=FILE    Output file

Help Options:
  -h, --help        Show this help message

Available commands:
  add     Add a file (aliases: a)
  remove  Remove a file
";
        assert_eq!(p.help(), expected);

        let expected = "Usage:
  app [OPTIONS] add [add-OPTIONS] file

Application Options:
  -v, --verbose         Verbose output
      --out=FILE        Output file

Help Options:
  -h, --help            Show this help message

[add command options]
      -f, --force       Overwrite existing entries

[add command arguments]
  file:                 File to add
";
        assert_eq!(p.help_for(&["a"]).as_deref(), Some(expected));
        assert!(p.help_for(&["nope"]).is_none());
    }

    #[test]
    fn version_flag_only_exists_with_a_version() {
        let mut p = parser(Command::new("app").version("1.2.0"));
        let err = parse_err(&mut p, &["--version"]);
        assert_eq!(err.kind(), ErrorKind::Version);
        assert_eq!(err.message(), "app 1.2.0\n");
        assert_eq!(parse_err(&mut p, &["-V"]).kind(), ErrorKind::Version);
        assert_eq!(p.version(), "app 1.2.0\n");

        let mut plain = parser(Command::new("app"));
        assert_eq!(parse_err(&mut plain, &["-V"]).kind(), ErrorKind::UnknownFlag);
    }

    #[test]
    fn builtins_yield_to_declared_names() {
        let mut p = parser(
            Command::new("app").flag(Flag::new("host").short('h').kind(ValueKind::String)),
        );
        parse_ok(&mut p, &["-h", "example.org"]);
        assert_eq!(p.matches().get_str("host"), Some("example.org"));
        assert_eq!(parse_err(&mut p, &["--help"]).kind(), ErrorKind::Help);

        let mut bare = Parser::with_options(
            Command::new("app"),
            ParserOptions {
                help_flag: false,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(parse_err(&mut bare, &["--help"]).kind(), ErrorKind::UnknownFlag);
    }

    #[test]
    fn negative_numbers_are_values() {
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("n").long("n").kind(ValueKind::Int))
                .flag(Flag::new("ratio").long("ratio").kind(ValueKind::Float))
                .positional(Positional::new("offset").kind(ValueKind::Int)),
        );
        parse_ok(&mut p, &["--n", "-5", "--ratio", "-.5", "-3"]);
        let m = p.matches();
        assert_eq!(m.get_int("n"), Some(-5));
        assert_eq!(m.get("ratio"), Some(&Value::Float(-0.5)));
        assert_eq!(m.get_int("offset"), Some(-3));

        let err = parse_err(&mut p, &["--n", "-x"]);
        assert_eq!(err.kind(), ErrorKind::ExpectedArgument);
        assert_eq!(
            err.message(),
            "expected argument for flag `--n', but got option `-x'"
        );
    }

    #[test]
    fn optional_values_never_take_the_next_token() {
        let mut p = parser(
            Command::new("app").flag(
                Flag::new("color")
                    .long("color")
                    .kind(ValueKind::String)
                    .optional_value("auto"),
            ),
        );
        let rest = parse_ok(&mut p, &["--color", "x"]);
        assert_eq!(p.matches().get_str("color"), Some("auto"));
        assert_eq!(rest, strings(&["x"]));

        parse_ok(&mut p, &["--color=never"]);
        assert_eq!(p.matches().get_str("color"), Some("never"));
    }

    #[test]
    fn env_sits_between_argv_and_defaults() {
        let mut p = parser(
            Command::new("app").flag(
                Flag::new("format")
                    .long("format")
                    .kind(ValueKind::String)
                    .default_value("plain")
                    .env("FORMAT")
                    .required(true),
            ),
        );
        let env = vec![("FORMAT".to_string(), "json".to_string())];

        p.parse_with_env(Vec::<String>::new(), &env).unwrap();
        let m = p.matches();
        assert_eq!(m.get_str("format"), Some("json"));
        assert!(m.is_present("format"));
        assert!(!m.is_explicit("format"));

        p.parse_with_env(["--format", "xml"], &env).unwrap();
        assert_eq!(p.matches().get_str("format"), Some("xml"));
        assert!(p.matches().is_explicit("format"));

        let err = parse_err(&mut p, &[]);
        assert_eq!(err.kind(), ErrorKind::Required);
    }

    #[test]
    fn namespaces_compose_long_names() {
        let mut p = parser(
            Command::new("app").group(
                Group::new("Subgroup")
                    .namespace("sip")
                    .flag(Flag::new("").long("opt"))
                    .group(
                        Group::new("Subsubgroup")
                            .namespace("sap")
                            .flag(Flag::new("").long("opt")),
                    ),
            ),
        );
        parse_ok(&mut p, &["--sip.opt", "--sip.sap.opt"]);
        let m = p.matches();
        assert!(m.get_bool("sip.opt"));
        assert!(m.get_bool("sip.sap.opt"));
        assert_eq!(parse_err(&mut p, &["--opt"]).message(), "unknown flag `opt'");
    }

    #[test]
    fn hidden_flags_and_hidden_groups_still_parse() {
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("x").long("xx").hidden(true))
                .group(
                    Group::new("g")
                        .hidden(true)
                        .flag(Flag::new("y").short('y').kind(ValueKind::Int)),
                ),
        );
        assert!(parse_ok(&mut p, &["--xx", "-y", "3"]).is_empty());
        let m = p.matches();
        assert!(m.get_bool("x"));
        assert_eq!(m.get_int("y"), Some(3));
        assert!(m.is_explicit("x") && m.is_explicit("y"));
        assert!(!p.help().contains("xx"));
    }

    #[test]
    fn case_insensitive_command_names_must_stay_distinct() {
        let err = Parser::with_options(
            Command::new("app")
                .subcommand(Command::new("Add"))
                .subcommand(Command::new("add")),
            ParserOptions {
                case_insensitive: true,
                ..Default::default()
            },
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
        assert!(err.message().contains("`add'"));
    }

    #[test]
    fn case_insensitive_matching_covers_flags_and_commands() {
        let mut p = Parser::with_options(
            app_with_commands(),
            ParserOptions {
                case_insensitive: true,
                ..Default::default()
            },
        )
        .unwrap();
        parse_ok(&mut p, &["--VERBOSE", "ADD", "x"]);
        assert_eq!(p.active_path(), vec!["app", "add"]);
        assert!(p.matches().get_bool("verbose"));
    }

    #[test]
    fn unknown_commands_get_a_suggestion() {
        let mut p = parser(app_with_commands());
        let err = parse_err(&mut p, &["remvoe"]);
        assert_eq!(err.kind(), ErrorKind::UnknownCommand);
        assert_eq!(err.message(), "Unknown command `remvoe', did you mean `remove'?");
    }

    #[test]
    fn a_command_is_required_unless_optional() {
        let mut p = parser(app_with_commands());
        let err = parse_err(&mut p, &["-v"]);
        assert_eq!(err.kind(), ErrorKind::CommandRequired);
        assert_eq!(err.message(), "Please specify one command of: add or remove");

        let mut p = parser(app_with_commands().subcommands_optional(true));
        assert!(parse_ok(&mut p, &["-v"]).is_empty());
        assert_eq!(p.active_path(), vec!["app"]);
    }

    #[test]
    fn required_positional_is_filled_before_dispatch() {
        let cmd = || {
            Command::new("app")
                .positional(Positional::new("target").required(true))
                .subcommand(Command::new("build"))
        };
        let mut p = parser(cmd());
        let err = parse_err(&mut p, &["build"]);
        assert_eq!(err.kind(), ErrorKind::CommandRequired);
        assert_eq!(err.message(), "Please specify the build command");
        assert_eq!(p.value("target"), Some(&Value::Str("build".to_string())));

        parse_ok(&mut p, &["t", "build"]);
        assert_eq!(p.active_path(), vec!["app", "build"]);
        assert_eq!(p.value("target"), Some(&Value::Str("t".to_string())));
    }

    #[test]
    fn missing_positionals_are_named() {
        let mut p = parser(
            Command::new("app")
                .positional(Positional::new("src").required(true))
                .positional(Positional::new("dst").required(true)),
        );
        let err = parse_err(&mut p, &[]);
        assert_eq!(
            err.message(),
            "the required arguments `src` and `dst` were not provided"
        );

        let mut p = parser(
            Command::new("app").positional(
                Positional::new("files")
                    .kind(ValueKind::list(ValueKind::String))
                    .at_least(2),
            ),
        );
        let err = parse_err(&mut p, &["a"]);
        assert_eq!(err.kind(), ErrorKind::Required);
        assert_eq!(
            err.message(),
            "the required argument `files (at least 2 arguments, but got only 1)` was not provided"
        );
        parse_ok(&mut p, &["a", "b", "c"]);
        assert_eq!(p.matches().get_all("files").map(|f| f.len()), Some(3));
    }

    #[test]
    fn remainder_maximum_spills_into_rest() {
        let mut p = parser(
            Command::new("app").positional(
                Positional::new("files")
                    .kind(ValueKind::list(ValueKind::String))
                    .at_most(2),
            ),
        );
        assert_eq!(parse_ok(&mut p, &["a", "b", "c"]), strings(&["c"]));
    }

    #[test]
    fn ignore_unknown_passes_flags_through() {
        let mut p = Parser::with_options(
            Command::new("app").flag(Flag::new("v").short('v')),
            ParserOptions {
                ignore_unknown: true,
                ..Default::default()
            },
        )
        .unwrap();
        let rest = parse_ok(&mut p, &["--bogus", "-v", "x"]);
        assert_eq!(rest, strings(&["--bogus", "x"]));
        assert!(p.matches().get_bool("v"));
    }

    #[test]
    fn ignore_unknown_passes_a_cluster_with_an_unknown_letter_whole() {
        let mut p = Parser::with_options(
            Command::new("app").flag(Flag::new("v").short('v')),
            ParserOptions {
                ignore_unknown: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(parse_ok(&mut p, &["-vz", "x"]), strings(&["-vz", "x"]));
        assert!(!p.matches().get_bool("v"));
        assert!(!p.matches().is_explicit("v"));
    }

    #[test]
    fn pass_after_non_option_stops_option_parsing() {
        let cmd = || Command::new("app").flag(Flag::new("v").short('v'));
        let mut p = Parser::with_options(
            cmd(),
            ParserOptions {
                pass_after_non_option: true,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(parse_ok(&mut p, &["-v", "x", "-v"]), strings(&["x", "-v"]));
        assert!(p.matches().get_bool("v"));

        let mut per_command = parser(cmd().pass_after_non_option(true));
        assert_eq!(parse_ok(&mut per_command, &["x", "-v"]), strings(&["x", "-v"]));
        assert!(!per_command.matches().get_bool("v"));
    }

    #[test]
    fn conversion_and_lookup_failures_carry_their_kind() {
        let mut p = parser(
            Command::new("app")
                .flag(Flag::new("n").long("n").kind(ValueKind::Int))
                .flag(
                    Flag::new("animal")
                        .long("animal")
                        .kind(ValueKind::String)
                        .choices(["dog", "cat"]),
                ),
        );
        let err = parse_err(&mut p, &["--n", "abc"]);
        assert_eq!(err.kind(), ErrorKind::Marshal);
        assert!(err.message().starts_with("invalid argument for flag `--n' (expected int)"));

        let err = parse_err(&mut p, &["--animal", "cow"]);
        assert_eq!(
            err.message(),
            "Invalid value `cow' for option `--animal'. Allowed values are: dog or cat"
        );

        let err = parse_err(&mut p, &["--n"]);
        assert_eq!(err.kind(), ErrorKind::ExpectedArgument);
        assert_eq!(err.message(), "expected argument for flag `--n'");

        assert_eq!(parse_err(&mut p, &["-z"]).message(), "unknown flag `z'");
    }

    #[test]
    fn schema_errors_surface_at_construction() {
        let err = Parser::new(
            Command::new("app").flag(Flag::new("n").long("n").kind(ValueKind::Int).default_value("abc")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);

        let err = Parser::new(
            Command::new("app")
                .flag(Flag::new("a").long("same"))
                .flag(Flag::new("b").long("same")),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);

        let err = Parser::new(
            Command::new("app")
                .flag(Flag::new("n").long("n").kind(ValueKind::Int).preset(Value::Str("5".into()))),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidSchema);
    }

    #[test]
    fn matches_serialize_per_command_level() {
        let mut p = parser(app_with_commands());
        parse_ok(&mut p, &["-v", "add", "x.txt"]);
        let json = serde_json::to_value(p.matches()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "command": "app",
                "values": { "verbose": true, "out": "" },
                "explicit": ["verbose"],
                "subcommand": {
                    "command": "add",
                    "values": { "force": false, "file": "x.txt" },
                    "explicit": ["file"]
                }
            })
        );
    }
}
