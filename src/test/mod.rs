use assert_matches::assert_matches;
use rstest::rstest;
use serde::Deserialize;

use crate::{
    ArgumentSpec, ConfigError, Container, Error, Invocation, MatchError, MatchErrorKind,
    OptionSpec, Parser, Source, Value,
};

fn no_env(_: &str) -> Option<String> {
    None
}

fn compile(c: Container) -> Parser {
    match c.compile() {
        Ok(p) => p,
        Err(err) => panic!("compile failed: {err}"),
    }
}

fn parse(p: &Parser, argv: &[&str]) -> Result<Invocation, MatchError> {
    p.parse_with_env(argv.iter().copied(), no_env)
}

fn ok(p: &Parser, argv: &[&str]) -> Invocation {
    match parse(p, argv) {
        Ok(inv) => inv,
        Err(err) => panic!("{argv:?} should match '{}': {err}", p.spec()),
    }
}

fn exclusive() -> Parser {
    compile(
        Container::new("t")
            .option(OptionSpec::bool("a"))
            .option(OptionSpec::bool("b"))
            .spec("[-a|-b]"),
    )
}

#[rstest]
#[case(vec![], true)]
#[case(vec!["-a"], true)]
#[case(vec!["-b"], true)]
#[case(vec!["-a", "-b"], false)]
#[case(vec!["-b", "-a"], false)]
#[case(vec!["-ab"], false)]
#[case(vec!["-a", "-a"], false)]
fn exclusive_choice(#[case] argv: Vec<&str>, #[case] accepted: bool) {
    assert_eq!(parse(&exclusive(), &argv).is_ok(), accepted);
}

#[test]
fn exclusive_choice_names_the_offender() {
    let err = parse(&exclusive(), &["-a", "-b"]).unwrap_err();
    assert_eq!(err.kind, MatchErrorKind::UnexpectedOption("-b".to_string()));
    assert_eq!(err.command, "t");
}

#[test]
fn folding_equals_separate_flags() {
    let p = compile(
        Container::new("t")
            .option(OptionSpec::bool("i"))
            .option(OptionSpec::bool("t tty")),
    );
    let folded = ok(&p, &["-it"]);
    let separate = ok(&p, &["-i", "-t"]);
    assert_eq!(folded.binding, separate.binding);
    assert!(folded.binding.get_bool("-i"));
    assert!(folded.binding.get_bool("--tty"));
}

#[rstest]
#[case(vec!["-e=val"])]
#[case(vec!["-e", "val"])]
#[case(vec!["-eval"])]
#[case(vec!["--extra=val"])]
#[case(vec!["--extra", "val"])]
fn attached_values(#[case] argv: Vec<&str>) {
    let p = compile(Container::new("t").option(OptionSpec::string("e extra")));
    let inv = ok(&p, &argv);
    assert_eq!(inv.binding.get_str("-e"), "val");
    assert_eq!(inv.binding.get_str("--extra"), "val");
    assert_eq!(inv.binding.source("--extra"), Some(&Source::Argv));
}

#[test]
fn repeated_option_keeps_order() {
    let p = compile(
        Container::new("t")
            .option(OptionSpec::string("e").repeated())
            .spec("(-e)..."),
    );
    let inv = ok(&p, &["-e", "PATH:/bin", "-e", "PATH:/usr/bin"]);
    assert_eq!(inv.binding.get_vec("-e"), vec!["PATH:/bin", "PATH:/usr/bin"]);
    assert!(parse(&p, &[]).is_err());
}

fn cp(spec: &str) -> Parser {
    compile(
        Container::new("cp")
            .argument(ArgumentSpec::string("SRC").repeated())
            .argument(ArgumentSpec::string("DST"))
            .spec(spec),
    )
}

#[test]
fn repetition_gives_back_for_mandatory_tail() {
    let inv = ok(&cp("SRC... DST"), &["a", "b", "c"]);
    assert_eq!(inv.binding.get_vec("SRC"), vec!["a", "b"]);
    assert_eq!(inv.binding.get_str("DST"), "c");
}

#[test]
fn repetition_keeps_everything_before_optional_tail() {
    let inv = ok(&cp("SRC... [DST]"), &["a", "b", "c"]);
    assert_eq!(inv.binding.get_vec("SRC"), vec!["a", "b", "c"]);
    assert_eq!(inv.binding.source("DST"), Some(&Source::Unset));
    assert_eq!(inv.binding.get_str("DST"), "");
}

#[test]
fn too_few_arguments_lists_expected() {
    let err = parse(&cp("SRC... DST"), &["a"]).unwrap_err();
    assert_eq!(err.kind, MatchErrorKind::Missing);
    assert!(err.expected.contains(&"DST".to_string()));
    assert!(err.to_string().starts_with("Not enough arguments."));
}

#[test]
fn long_argument_lists_do_not_recurse() {
    let argv: Vec<String> = (0..20_000).map(|i| format!("f{i}")).collect();
    let inv = cp("SRC... DST").parse_with_env(argv, no_env).unwrap();
    assert_eq!(inv.binding.get_vec("SRC").len(), 19_999);
    assert_eq!(inv.binding.get_str("DST"), "f19999");
}

#[test]
fn all_options_matches_explicit_choice() {
    let declare = || {
        ["a", "b", "c", "d"]
            .iter()
            .fold(Container::new("t"), |c, n| c.option(OptionSpec::bool(n)))
    };
    let derived = compile(declare());
    let explicit = compile(declare().spec("[-a|-b|-c|-d]..."));
    assert_eq!(derived.spec(), "[OPTIONS]");

    let alphabet = ["-a", "-b", "-c", "-d", "-x", "-ab", "-dca", "x"];
    let mut inputs: Vec<Vec<&str>> = vec![vec![]];
    for _ in 0..3 {
        let longer: Vec<Vec<&str>> = inputs
            .iter()
            .filter(|i| i.len() == inputs.last().map_or(0, Vec::len))
            .flat_map(|i| {
                alphabet.iter().map(move |t| {
                    let mut next = i.clone();
                    next.push(*t);
                    next
                })
            })
            .collect();
        inputs.extend(longer);
    }
    for input in &inputs {
        assert_eq!(
            parse(&derived, input).is_ok(),
            parse(&explicit, input).is_ok(),
            "disagreement on {input:?}"
        );
    }
}

#[test]
fn compiling_twice_is_identical() {
    let c = Container::new("t")
        .option(OptionSpec::bool("v verbose"))
        .option(OptionSpec::string("o"))
        .argument(ArgumentSpec::string("X").repeated())
        .argument(ArgumentSpec::string("Y"))
        .spec("[-v | -o] (X | Y)... [-v]");
    let (one, two) = (compile(c.clone()), compile(c));
    assert_eq!(one.automaton(), two.automaton());
    assert_eq!(one.ast(), two.ast());
    for argv in [
        vec!["x"],
        vec!["-v", "x", "y", "-v"],
        vec!["-o", "1"],
        vec!["-o", "1", "x", "-v", "-v"],
    ] {
        assert_eq!(parse(&one, &argv).is_ok(), parse(&two, &argv).is_ok());
    }
}

#[rstest]
#[case("-x")]
#[case("--extra")]
#[case("FILE")]
#[case("[-v] (SRC | FILES)")]
fn undeclared_reference_fails_at_compile_time(#[case] spec: &str) {
    let c = Container::new("t")
        .option(OptionSpec::bool("v"))
        .argument(ArgumentSpec::string("SRC"))
        .spec(spec);
    let err = c.compile().unwrap_err();
    assert_matches!(
        err,
        ConfigError::UndeclaredOption { .. } | ConfigError::UndeclaredArgument { .. }
    );
    assert!(Error::from(err).is_config());
}

#[test]
fn undeclared_reference_suggests() {
    let err = Container::new("t")
        .option(OptionSpec::bool("f force"))
        .spec("--forse")
        .compile()
        .unwrap_err();
    assert_eq!(err, ConfigError::UndeclaredOption {
        name:       "--forse".to_string(),
        suggestion: Some("--force".to_string()),
    });
}

fn with_env() -> Parser {
    compile(
        Container::new("t").option(OptionSpec::string("o opt").env("FOO").default("dflt")),
    )
}

#[test]
fn environment_fills_unseen_option() {
    let inv = with_env()
        .parse_with_env(Vec::<String>::new(), |var: &str| {
            (var == "FOO").then(|| "bar".to_string())
        })
        .unwrap();
    assert_eq!(inv.binding.get_str("--opt"), "bar");
    assert_eq!(inv.binding.source("-o"), Some(&Source::Env("FOO".to_string())));
    assert!(!inv.binding.is_seen("-o"));
}

#[test]
fn default_when_environment_is_empty() {
    let inv = ok(&with_env(), &[]);
    assert_eq!(inv.binding.get_str("-o"), "dflt");
    assert_eq!(inv.binding.source("-o"), Some(&Source::Default));
}

#[test]
fn argv_beats_environment() {
    let inv = with_env()
        .parse_with_env(vec!["-o", "cli"], |_: &str| Some("bar".to_string()))
        .unwrap();
    assert_eq!(inv.binding.get_str("-o"), "cli");
    assert!(inv.binding.is_seen("--opt"));
}

#[test]
fn double_dash_makes_everything_positional() {
    let p = compile(
        Container::new("t")
            .option(OptionSpec::bool("v"))
            .argument(ArgumentSpec::string("FILE").repeated())
            .spec("[-v] [FILE...]"),
    );
    let inv = ok(&p, &["-v", "--", "-v", "-", "--"]);
    assert!(inv.binding.get_bool("-v"));
    assert_eq!(inv.binding.get_vec("FILE"), vec!["-v", "-", "--"]);

    let inv = ok(&p, &["-"]);
    assert_eq!(inv.binding.get_vec("FILE"), vec!["-"]);
}

#[test]
fn option_values_may_look_like_options() {
    let p = compile(Container::new("t").option(OptionSpec::int("n num")));
    assert_eq!(ok(&p, &["-n", "-5"]).binding.get_int("--num"), -5);
    assert_eq!(ok(&p, &["--num=-7"]).binding.get_int("-n"), -7);
}

#[test]
fn flags_accept_explicit_values() {
    let p = compile(Container::new("t").option(OptionSpec::bool("t tty").default(true)));
    let inv = ok(&p, &["--tty=false"]);
    assert!(!inv.binding.get_bool("-t"));
    assert!(inv.binding.is_seen("-t"));
    assert!(ok(&p, &[]).binding.get_bool("-t"));
}

#[rstest]
#[case(vec!["--forse"], MatchErrorKind::UnknownOption {
    token:      "--forse".to_string(),
    suggestion: Some("--force".to_string()),
})]
#[case(vec!["-q"], MatchErrorKind::UnknownOption { token: "-q".to_string(), suggestion: None })]
#[case(vec!["-n"], MatchErrorKind::MissingValue("-n".to_string()))]
#[case(vec!["-n", "ten"], MatchErrorKind::InvalidValue {
    name:  "-n".to_string(),
    value: "ten".to_string(),
    kind:  crate::ValueKind::Int,
})]
#[case(vec!["stray"], MatchErrorKind::UnexpectedArgument("stray".to_string()))]
fn match_failures(#[case] argv: Vec<&str>, #[case] expected: MatchErrorKind) {
    let p = compile(
        Container::new("t")
            .option(OptionSpec::bool("f force"))
            .option(OptionSpec::int("n")),
    );
    assert_eq!(parse(&p, &argv).unwrap_err().kind, expected);
}

fn app() -> Parser {
    compile(
        Container::new("app")
            .option(OptionSpec::bool("v verbose"))
            .command(
                Container::new("build")
                    .option(OptionSpec::bool("r release"))
                    .argument(ArgumentSpec::string("TARGET"))
                    .spec("[-r] [TARGET]"),
            )
            .command(Container::new("clean")),
    )
}

#[test]
fn sub_command_hand_off() {
    let inv = ok(&app(), &["-v", "build", "-r", "x86"]);
    assert!(inv.binding.get_bool("-v"));
    assert_eq!(inv.command_path(), vec!["build"]);
    let build = inv.leaf();
    assert_eq!(build.name, "build");
    assert!(build.binding.get_bool("--release"));
    assert_eq!(build.binding.get_str("TARGET"), "x86");

    let inv = ok(&app(), &[]);
    assert!(inv.command.is_none());
    assert!(inv.command_path().is_empty());
}

#[test]
fn sub_command_errors_carry_the_path() {
    let err = parse(&app(), &["build", "-q"]).unwrap_err();
    assert_eq!(err.command, "app build");
    assert_matches!(err.kind, MatchErrorKind::UnknownOption { .. });

    let err = parse(&app(), &["deploy"]).unwrap_err();
    assert_eq!(err.command, "app");
    assert_eq!(err.kind, MatchErrorKind::UnexpectedArgument("deploy".to_string()));
}

#[test]
fn sub_command_name_after_double_dash_is_positional() {
    let p = compile(
        Container::new("app")
            .argument(ArgumentSpec::string("FILE").repeated())
            .spec("[FILE...]")
            .command(Container::new("build")),
    );
    let inv = ok(&p, &["--", "build"]);
    assert!(inv.command.is_none());
    assert_eq!(inv.binding.get_vec("FILE"), vec!["build"]);
}

fn files_then_build() -> Parser {
    compile(
        Container::new("app")
            .option(OptionSpec::string("o out"))
            .argument(ArgumentSpec::string("FILE").repeated())
            .spec("[-o] [FILE...]")
            .command(
                Container::new("build")
                    .argument(ArgumentSpec::string("TARGET"))
                    .spec("[TARGET]"),
            ),
    )
}

#[rstest]
#[case(vec!["build"], vec![], "")]
#[case(vec!["a", "build"], vec!["a"], "")]
#[case(vec!["a", "b", "build", "x86"], vec!["a", "b"], "x86")]
fn sub_command_name_ends_optional_positionals(
    #[case] argv: Vec<&str>,
    #[case] files: Vec<&str>,
    #[case] target: &str,
) {
    let inv = ok(&files_then_build(), &argv);
    assert_eq!(inv.binding.get_vec("FILE"), files);
    assert_eq!(inv.command_path(), vec!["build"]);
    assert_eq!(inv.leaf().binding.get_str("TARGET"), target);
}

#[test]
fn sub_command_name_as_option_value() {
    let inv = ok(&files_then_build(), &["-o", "build"]);
    assert_eq!(inv.binding.get_str("--out"), "build");
    assert!(inv.command.is_none());
}

#[allow(non_snake_case)]
#[derive(Debug, Deserialize)]
struct AppArgs {
    flag_verbose: bool,
    flag_release: bool,
    arg_TARGET:   Option<String>,
    cmd_build:    bool,
    cmd_clean:    bool,
}

#[test]
fn decode_invocation_into_struct() {
    let args: AppArgs = ok(&app(), &["build", "--release"]).deserialize().unwrap();
    assert!(!args.flag_verbose);
    assert!(args.flag_release);
    assert_eq!(args.arg_TARGET, None);
    assert!(args.cmd_build);
    assert!(!args.cmd_clean);
}

#[test]
fn decode_type_mismatch() {
    #[allow(non_snake_case, dead_code)]
    #[derive(Debug, Deserialize)]
    struct Args {
        arg_SRC: i32,
    }
    let p = compile(Container::new("t").argument(ArgumentSpec::string("SRC")));
    let err = ok(&p, &["abc"]).deserialize::<Args>().unwrap_err();
    assert_matches!(err, Error::Deserialize(_));
    assert!(!err.is_config());
}

#[rstest]
#[case(
    Container::new("t").command(Container::new("x")).command(Container::new("x")),
    ConfigError::DuplicateCommand("x".to_string())
)]
#[case(
    Container::new("t").option(OptionSpec::bool("f")).option(OptionSpec::bool("f force")),
    ConfigError::DuplicateName("f".to_string())
)]
#[case(
    Container::new("t").argument(ArgumentSpec::string("SRC")).spec("SRC SRC"),
    ConfigError::DuplicateArgumentReference("SRC".to_string())
)]
#[case(
    Container::new("t").option(OptionSpec::int("n").default("ten")),
    ConfigError::DefaultKind { name: "-n".to_string(), expected: crate::ValueKind::Int }
)]
fn configuration_errors(#[case] c: Container, #[case] expected: ConfigError) {
    assert_eq!(c.compile().unwrap_err(), expected);
}

#[test]
fn invalid_declarations() {
    let err = Container::new("t")
        .argument(ArgumentSpec::string("src"))
        .compile()
        .unwrap_err();
    assert_matches!(err, ConfigError::InvalidName { ref name, .. } if name == "src");

    let err = Container::new("t")
        .option(OptionSpec::bool("a"))
        .spec("[-a")
        .compile()
        .unwrap_err();
    assert_matches!(err, ConfigError::Syntax { .. });
}

#[test]
fn derived_spec_for_repeated_argument() {
    let p = compile(
        Container::new("run")
            .option(OptionSpec::bool("d"))
            .argument(ArgumentSpec::string("IMAGE"))
            .argument(ArgumentSpec::string("ARG").repeated()),
    );
    assert_eq!(p.spec(), "[OPTIONS] IMAGE ARG...");
    let inv = ok(&p, &["-d", "ubuntu", "sh"]);
    assert!(inv.binding.get_bool("-d"));
    assert_eq!(inv.binding.get("ARG"), Some(&Value::List(vec!["sh".into()])));

    // Options are only recognised where the spec places them.
    let err = parse(&p, &["ubuntu", "-d", "sh"]).unwrap_err();
    assert_eq!(err.kind, MatchErrorKind::UnexpectedOption("-d".to_string()));
}

#[test]
fn parsers_are_shareable() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Parser>();

    let p = std::sync::Arc::new(cp("SRC... DST"));
    let handles: Vec<_> = (0..4)
        .map(|i| {
            let p = std::sync::Arc::clone(&p);
            std::thread::spawn(move || {
                let inv = p
                    .parse_with_env(vec!["a".to_string(), i.to_string()], no_env)
                    .unwrap();
                inv.binding.get_str("DST").to_string()
            })
        })
        .collect();
    for (i, h) in handles.into_iter().enumerate() {
        assert_eq!(h.join().unwrap(), i.to_string());
    }
}
