use std::sync::Arc;
use std::thread;

use cligram_core::{
    App, Arity, ChartParser, CommandModel, CommandSchema, Error, Field, Fields, Grammar,
    InvokeOptions, ParamSchema, Value, ValueType, compile, extract, lexer, validate,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn pets() -> CommandSchema {
    CommandSchema::new("top")
        .with_subcommand(
            CommandSchema::new("dog")
                .with_param(ParamSchema::option(["--dog-name"]))
                .with_param(ParamSchema::option(["--dog-color"]).allow_multiple())
                .with_param(
                    ParamSchema::option(["--age"])
                        .with_type(ValueType::Integer)
                        .with_default(9),
                ),
        )
        .with_subcommand(
            CommandSchema::new("cat")
                .with_param(ParamSchema::option(["--cat-name"]))
                .with_subcommand(
                    CommandSchema::new("owner").with_param(ParamSchema::option(["--owner-name"])),
                ),
        )
}

fn strings(items: &[&str]) -> Value {
    Value::List(items.iter().map(|s| Value::from(*s)).collect())
}

// ---------------------------------------------------------------------------
// End-to-end
// ---------------------------------------------------------------------------

#[test]
fn test_end_to_end_pets() {
    let app = App::passthrough(&pets()).unwrap();
    let fields = app
        .invoke_str(
            "top dog --dog-name fido --dog-color brown --dog-color black --age 21 \
             cat --cat-name felix owner --owner-name Alice",
        )
        .unwrap();

    let dog = fields["dog"].as_command().unwrap();
    assert_eq!(dog.value("dog_name"), Some(&Value::from("fido")));
    assert_eq!(dog.value("dog_color"), Some(&strings(&["brown", "black"])));
    assert_eq!(dog.value("age"), Some(&Value::Integer(21)));

    let cat = fields["cat"].as_command().unwrap();
    assert_eq!(cat.value("cat_name"), Some(&Value::from("felix")));
    let owner = cat.command("owner").unwrap();
    assert_eq!(owner.value("owner_name"), Some(&Value::from("Alice")));

    let json = serde_json::to_value(&fields).unwrap();
    assert_eq!(
        json,
        serde_json::json!({
            "dog": {"dog_name": "fido", "dog_color": ["brown", "black"], "age": 21},
            "cat": {"cat_name": "felix", "owner": {"owner_name": "Alice"}}
        })
    );
}

#[test]
fn test_end_to_end_pets_from_argument_list() {
    let app = App::passthrough(&pets()).unwrap();
    let fields = app
        .invoke_args(["top", "dog", "--dog-name", "Rex the 2nd", "--dog-color", "it's brown"])
        .unwrap();
    let dog = fields["dog"].as_command().unwrap();
    assert_eq!(dog.value("dog_name"), Some(&Value::from("Rex the 2nd")));
    assert_eq!(dog.value("dog_color"), Some(&strings(&["it's brown"])));
    assert_eq!(dog.value("age"), Some(&Value::Integer(9)));
}

#[test]
fn test_unknown_token_is_rejected() {
    let app = App::passthrough(&pets()).unwrap();
    let err = app.invoke_str("top fish --nonexistent x").unwrap_err();
    match err {
        Error::Parse(parse) => {
            assert_eq!(parse.input, "top fish --nonexistent x");
            assert_eq!(parse.found.as_deref(), Some("fish"));
            assert_eq!(parse.position, Some(1));
        }
        other => panic!("expected a parse error, got {other:?}"),
    }
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn test_round_trip_of_required_exact_options() {
    let schema = CommandSchema::new("connect")
        .with_param(ParamSchema::option(["--host"]).required())
        .with_param(ParamSchema::option(["-p", "--port"]).required().with_type(ValueType::Integer))
        .with_param(ParamSchema::option(["--user"]).required());
    let app = App::passthrough(&schema).unwrap();

    let cases = [
        ("db.example.com", 5432, "alice"),
        ("localhost", 1, "bob smith"),
        ("::1", 65535, "--weird"),
        ("10.0.0.1", -7, ""),
    ];
    for (host, port, user) in cases {
        let port_text = port.to_string();
        let args = ["connect", "--user", user, "-p", port_text.as_str(), "--host", host];
        let fields = app.invoke_args(args).unwrap();
        assert_eq!(fields["host"], Field::Value(Value::from(host)), "{args:?}");
        assert_eq!(fields["port"], Field::Value(Value::Integer(port)), "{args:?}");
        assert_eq!(fields["user"], Field::Value(Value::from(user)), "{args:?}");
    }
}

#[test]
fn test_same_display_name_never_merges_rules() {
    let schema = CommandSchema::new("top")
        .with_subcommand(
            CommandSchema::new("dog")
                .with_param(ParamSchema::option(["--name"]).required())
                .with_param(ParamSchema::switch(["--bark"])),
        )
        .with_subcommand(
            CommandSchema::new("cat")
                .with_param(ParamSchema::option(["--name"]).required())
                .with_param(ParamSchema::switch(["--purr"])),
        );
    let model = CommandModel::build(&schema).unwrap();
    let grammar = Grammar::from_model(&model);

    let name_rules: Vec<&str> = grammar
        .rules()
        .filter(|rule| model.node(rule.id).name == "name")
        .map(|rule| rule.name.as_str())
        .collect();
    assert_eq!(name_rules.len(), 2);
    assert_ne!(name_rules[0], name_rules[1]);

    // --name given to dog must not satisfy cat's required --name
    let parser = ChartParser::new(&grammar);
    let tree = parser.parse("top dog --name rex cat --purr").unwrap();
    let err = validate(&tree, &model).unwrap_err();
    assert_eq!(err.name, "name");
    assert_eq!(err.observed, 0);
    assert_eq!(model.node(err.node).parent.map(|p| model.node(p).name.as_str()), Some("cat"));
}

#[test]
fn test_required_missing_fails_validation() {
    let schema = CommandSchema::new("deploy")
        .with_param(ParamSchema::option(["--env"]).required())
        .with_param(ParamSchema::switch(["--dry-run"]));
    let app = App::passthrough(&schema).unwrap();

    match app.invoke_str("deploy --dry-run").unwrap_err() {
        Error::InvalidInput(invalid) => {
            assert_eq!(invalid.name, "env");
            assert_eq!(invalid.observed, 0);
            assert_eq!(app.model().node(invalid.node).name, "env");
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
}

#[test]
fn test_single_required_param_missing_fails_validation() {
    let schema = CommandSchema::new("deploy").with_param(ParamSchema::option(["--env"]).required());
    let app = App::passthrough(&schema).unwrap();

    match app.invoke_str("deploy").unwrap_err() {
        Error::InvalidInput(invalid) => {
            assert_eq!(invalid.name, "env");
            assert_eq!(invalid.observed, 0);
        }
        other => panic!("expected invalid input, got {other:?}"),
    }
    assert_eq!(app.invoke_str("deploy --env=prod").unwrap()["env"], Field::Value(Value::from("prod")));
}

#[test]
fn test_values_containing_equals_round_trip() {
    let schema = CommandSchema::new("connect")
        .with_param(ParamSchema::option(["--user"]).required())
        .with_param(ParamSchema::argument("extra"));
    let app = App::passthrough(&schema).unwrap();

    for (user, extra) in [("-a=b", "--opt=1"), ("a=b", "-x=="), ("--", "k=v w")] {
        let fields = app.invoke_args(["connect", "--user", user, extra]).unwrap();
        assert_eq!(fields["user"], Field::Value(Value::from(user)), "{user} {extra}");
        assert_eq!(fields["extra"], Field::Value(Value::from(extra)), "{user} {extra}");
    }

    let fields = app.invoke_args(["connect", "--user=-a=b", "x"]).unwrap();
    assert_eq!(fields["user"], Field::Value(Value::from("-a=b")));
}

#[test]
fn test_long_positional_list_on_worker_thread() {
    let schema = CommandSchema::new("cat")
        .with_param(ParamSchema::switch(["-n"]))
        .with_param(ParamSchema::argument("files").with_arity(Arity::Unbounded));
    let app = App::passthrough(&schema).unwrap();

    let mut args = vec!["cat".to_string(), "-n".to_string()];
    args.extend((0..4000).map(|i| format!("f{i}.txt")));
    let fields = thread::spawn(move || app.invoke_args(&args).unwrap())
        .join()
        .unwrap();

    let files = fields["files"].to_value();
    let files = files.as_list().unwrap();
    assert_eq!(files.len(), 4000);
    assert_eq!(files[3999], Value::from("f3999.txt"));
    assert_eq!(fields["n"], Field::Value(Value::Bool(true)));
}

#[test]
fn test_multiple_option_aggregates_in_order() {
    let schema = CommandSchema::new("tag").with_param(
        ParamSchema::option(["-t", "--tag"])
            .allow_multiple()
            .with_type(ValueType::Integer),
    );
    let app = App::passthrough(&schema).unwrap();
    let fields = app.invoke_str("tag -t 3 --tag=1 -t=2").unwrap();
    assert_eq!(
        fields["tag"],
        Field::Value(Value::List(vec![Value::Integer(3), Value::Integer(1), Value::Integer(2)]))
    );
}

#[test]
fn test_unbounded_arity_never_fails_on_count() {
    let schema = CommandSchema::new("cat")
        .with_param(ParamSchema::argument("files").with_arity(Arity::Unbounded));
    let app = App::passthrough(&schema).unwrap();

    for count in 0..6 {
        let mut args = vec!["cat".to_string()];
        args.extend((0..count).map(|i| format!("file{i}.txt")));
        let fields = app.invoke_args(&args).unwrap();
        let files = fields.get("files").map(Field::to_value);
        match count {
            0 => assert_eq!(files, None),
            n => assert_eq!(files.and_then(|v| v.as_list().map(<[Value]>::len)), Some(n)),
        }
    }
}

#[test]
fn test_separator_forms_decode_identically() {
    let schema = CommandSchema::new("run")
        .with_param(ParamSchema::option(["-l", "--level"]).with_type(ValueType::Integer))
        .with_param(ParamSchema::option(["--label"]));
    let app = App::passthrough(&schema).unwrap();

    let spaced = app.invoke_str("run --level 3 --label x").unwrap();
    for line in [
        "run --level=3 --label=x",
        "run --level = 3 --label = x",
        "run -l=3 --label x",
        "run --label=x -l 3",
    ] {
        assert_eq!(app.invoke_str(line).unwrap(), spaced, "{line}");
    }
}

#[test]
fn test_repeated_subcommand_policy() {
    let last_wins = CommandSchema::new("db")
        .with_subcommand(CommandSchema::new("user").with_param(ParamSchema::option(["--name"])));
    let collect = CommandSchema::new("db").with_subcommand(
        CommandSchema::new("user")
            .allow_multiple()
            .with_param(ParamSchema::option(["--name"])),
    );
    let line = "db user --name ann user --name ben user --name cy";

    let fields = App::passthrough(&last_wins)
        .unwrap()
        .with_options(InvokeOptions::new().with_validate(false))
        .invoke_str(line)
        .unwrap();
    let user = fields["user"].as_command().unwrap();
    assert_eq!(user.value("name"), Some(&Value::from("cy")));

    let fields = App::passthrough(&collect).unwrap().invoke_str(line).unwrap();
    let names: Vec<Value> = fields["user"]
        .as_commands()
        .unwrap()
        .iter()
        .filter_map(|user| user.value("name").cloned())
        .collect();
    assert_eq!(names, vec![Value::from("ann"), Value::from("ben"), Value::from("cy")]);
}

#[test]
fn test_repeated_single_subcommand_fails_validation() {
    let schema = CommandSchema::new("db")
        .with_subcommand(CommandSchema::new("user").with_param(ParamSchema::option(["--name"])));
    let app = App::passthrough(&schema).unwrap();
    let err = app.invoke_str("db user --name a user --name b").unwrap_err();
    assert!(matches!(err, Error::InvalidInput(ref invalid) if invalid.observed == 2), "{err}");
}

#[test]
fn test_decode_error_carries_raw_value() {
    let app = App::passthrough(&pets()).unwrap();
    match app.invoke_str("top dog --dog-name fido --age old").unwrap_err() {
        Error::Decode(decode) => {
            assert_eq!(decode.parameter, "age");
            assert_eq!(decode.raw, "old");
        }
        other => panic!("expected decode error, got {other:?}"),
    }
}

#[test]
fn test_lexer_errors_surface_as_parse_errors() {
    let app = App::passthrough(&pets()).unwrap();
    let err = app.invoke_str("top dog --dog-name 'fido").unwrap_err();
    assert!(matches!(err, Error::Parse(ref parse) if parse.reason.is_some()));
    assert!(err.to_string().contains("unterminated single quote"), "{err}");
}

#[test]
fn test_grammar_is_deterministic_and_loadable() {
    let yaml = r#"
name: top
subcommands:
  - name: dog
    params:
      - name: dog_name
        kind: { type: flag, triggers: ["--dog-name"], takes_value: true }
      - name: dog_color
        kind: { type: flag, triggers: ["--dog-color"], takes_value: true }
        multiple: true
      - name: age
        kind: { type: flag, triggers: ["--age"], takes_value: true }
        value_type: integer
        default: 9
  - name: cat
    params:
      - name: cat_name
        kind: { type: flag, triggers: ["--cat-name"], takes_value: true }
    subcommands:
      - name: owner
        params:
          - name: owner_name
            kind: { type: flag, triggers: ["--owner-name"], takes_value: true }
"#;
    let loaded: CommandSchema = serde_yaml::from_str(yaml).unwrap();
    let from_yaml = compile(&loaded).unwrap();
    let from_code = compile(&pets()).unwrap();
    assert_eq!(from_yaml.to_string(), from_code.to_string());
    assert_eq!(from_yaml.fingerprint(), from_code.fingerprint());
}

// ---------------------------------------------------------------------------
// Lower-level pipeline
// ---------------------------------------------------------------------------

#[test]
fn test_manual_pipeline_matches_app() {
    let schema = pets();
    let model = CommandModel::build(&schema).unwrap();
    let parser = ChartParser::new(&Grammar::from_model(&model));
    let line = lexer::join_args(["top", "cat", "--cat-name", "tom", "owner", "--owner-name", "Jo"]);

    let tree = parser.parse(&line).unwrap();
    validate(&tree, &model).unwrap();
    let resolved = extract(&tree, &model).unwrap();

    let app_fields = App::passthrough(&schema).unwrap().invoke_str(&line).unwrap();
    assert_eq!(resolved.fields, app_fields);
    assert_eq!(resolved.name, "top");
}

// ---------------------------------------------------------------------------
// Concurrency
// ---------------------------------------------------------------------------

#[test]
fn test_shared_app_parses_concurrently() {
    let app: Arc<App<Fields>> = Arc::new(App::passthrough(&pets()).unwrap());

    let handles: Vec<_> = (0..8)
        .map(|i| {
            let app = Arc::clone(&app);
            thread::spawn(move || {
                let line = format!("top dog --dog-name dog{i} --age {i}");
                let fields = app.invoke_str(&line).unwrap();
                let dog = fields["dog"].as_command().unwrap().clone();
                (dog.value("dog_name").cloned(), dog.value("age").cloned())
            })
        })
        .collect();

    for (i, handle) in handles.into_iter().enumerate() {
        let (name, age) = handle.join().unwrap();
        assert_eq!(name, Some(Value::from(format!("dog{i}"))));
        assert_eq!(age, Some(Value::Integer(i as i64)));
    }

    // a failed parse leaves the shared grammar usable
    assert!(app.invoke_str("top fish").is_err());
    assert!(app.invoke_str("top dog --dog-name again").is_ok());
}
