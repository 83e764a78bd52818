//! Integration tests for layered configuration.

use std::io::Write;

use cligram_core::{CommandSchema, ParamSchema, Value, ValueType};
use cligram_sources::{
    CliSource, EnvFileSource, EnvSource, Layered, MergeStrategy, Source, SourceError, TomlSource, merge_values,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn appconfig() -> CommandSchema {
    CommandSchema::new("myapp")
        .with_param(ParamSchema::switch(["--debug"]))
        .with_param(ParamSchema::switch(["-v", "--verbose"]))
        .with_subcommand(
            CommandSchema::new("db")
                .with_param(ParamSchema::option(["--host"]).with_default("localhost"))
                .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer).with_default(5432))
                .with_param(ParamSchema::option(["--password"])),
        )
}

fn dance() -> CommandSchema {
    CommandSchema::new("myapp").with_subcommand(
        CommandSchema::new("dance")
            .with_param(ParamSchema::switch(["--debug"]))
            .with_param(ParamSchema::switch(["--dry-run"]))
            .with_param(ParamSchema::switch(["--logging"]))
            .with_param(ParamSchema::option(["--priority"]).with_type(ValueType::Float))
            .with_subcommand(
                CommandSchema::new("db")
                    .with_param(ParamSchema::option(["--host"]))
                    .with_param(ParamSchema::option(["--port"]).with_type(ValueType::Integer)),
            ),
    )
}

fn write_file(dir: &tempfile::TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    let mut file = std::fs::File::create(&path).unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    path
}

// ---------------------------------------------------------------------------
// Full stack
// ---------------------------------------------------------------------------

#[test]
fn test_cli_env_dotenv_toml_precedence() {
    let dir = tempfile::tempdir().unwrap();
    let dotenv = write_file(&dir, ".env", "MYAPP_DB_PASSWORD=hunter2\nMYAPP_DB_HOST=dotenv.example\n");
    let config = write_file(&dir, "config.toml", "[myapp]\nverbose = false\n\n[myapp.db]\nport = 9999\nhost = \"toml.example\"\n");

    let layered = Layered::builder()
        .with_cli(["myapp", "--debug", "db", "--host", "myhost.com"])
        .with_source(EnvSource::from_vars("myapp", [("MYAPP_VERBOSE", "1")]))
        .with_env_file(&dotenv, "myapp")
        .with_toml(&config)
        .build(&appconfig())
        .unwrap();
    assert_eq!(
        layered.layers().collect::<Vec<_>>(),
        vec!["cli", "env", "env_file", "toml", "defaults"]
    );

    let resolution = layered.read().unwrap();
    let value = &resolution.value;
    assert_eq!(value.get_path("debug"), Some(&Value::Bool(true)));
    assert_eq!(value.get_path("verbose"), Some(&Value::Bool(true)));
    assert_eq!(value.get_path("db.host"), Some(&Value::from("myhost.com")));
    assert_eq!(value.get_path("db.password"), Some(&Value::from("hunter2")));
    assert_eq!(value.get_path("db.port"), Some(&Value::Integer(9999)));

    let source_of = |path: &str| resolution.origin(path).map(|o| o.source.clone());
    assert_eq!(source_of("debug").as_deref(), Some("cli"));
    assert_eq!(source_of("verbose").as_deref(), Some("env"));
    assert_eq!(source_of("db.host").as_deref(), Some("cli"));
    assert_eq!(source_of("db.password").as_deref(), Some("env_file"));
    assert_eq!(source_of("db.port").as_deref(), Some("toml"));
}

#[test]
fn test_defaults_fill_only_what_no_layer_sets() {
    let resolution = Layered::builder()
        .with_cli(["myapp", "db", "--password", "pw"])
        .build(&appconfig())
        .unwrap()
        .read()
        .unwrap();

    assert_eq!(resolution.value.get_path("db.host"), Some(&Value::from("localhost")));
    assert_eq!(resolution.value.get_path("db.port"), Some(&Value::Integer(5432)));
    assert_eq!(resolution.value.get_path("debug"), Some(&Value::Bool(false)));
    assert_eq!(resolution.origin("db.password").unwrap().layer, 0);
    assert_eq!(resolution.origin("db.port").unwrap().source, "defaults");
}

#[test]
fn test_nested_subcommand_layers() {
    let dir = tempfile::tempdir().unwrap();
    let config = write_file(&dir, "config.toml", "[myapp.dance]\nlogging = true\npriority = 3\n");

    let resolution = Layered::builder()
        .with_cli(["myapp", "dance", "--debug", "db", "--host", "example.com", "--port", "9999"])
        .with_source(EnvSource::from_vars("myapp", [("MYAPP_DANCE_DRY_RUN", "1")]))
        .with_toml(&config)
        .without_defaults()
        .build(&dance())
        .unwrap()
        .read()
        .unwrap();

    let value = &resolution.value;
    assert_eq!(value.get_path("dance.debug"), Some(&Value::Bool(true)));
    assert_eq!(value.get_path("dance.dry_run"), Some(&Value::Bool(true)));
    assert_eq!(value.get_path("dance.logging"), Some(&Value::Bool(true)));
    assert_eq!(value.get_path("dance.priority"), Some(&Value::Float(3.0)));
    assert_eq!(value.get_path("dance.db.host"), Some(&Value::from("example.com")));
    assert_eq!(value.get_path("dance.db.port"), Some(&Value::Integer(9999)));
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[test]
fn test_bad_cli_stops_resolution() {
    let layered = Layered::builder()
        .with_cli(["myapp", "db", "--hots", "x"])
        .build(&appconfig())
        .unwrap();
    assert!(matches!(layered.read(), Err(SourceError::EngineError(_))));
}

#[test]
fn test_required_files_must_exist() {
    let dir = tempfile::tempdir().unwrap();
    let layered = Layered::builder()
        .with_source(TomlSource::new(dir.path().join("missing.toml")).required())
        .build(&appconfig())
        .unwrap();
    assert!(matches!(layered.read(), Err(SourceError::MissingFile(_))));

    let layered = Layered::builder()
        .with_source(EnvFileSource::new(dir.path().join(".env"), "myapp").required())
        .build(&appconfig())
        .unwrap();
    assert!(matches!(layered.read(), Err(SourceError::MissingFile(_))));
}

// ---------------------------------------------------------------------------
// Building blocks
// ---------------------------------------------------------------------------

#[test]
fn test_sources_compose_with_merge_values() {
    let layered = Layered::builder().build(&appconfig()).unwrap();
    let model = layered.model();

    let cli = CliSource::new(["myapp", "db", "--port", "1"]).read(model).unwrap();
    let env = EnvSource::from_vars("myapp", [("MYAPP_DB_PORT", "2"), ("MYAPP_DEBUG", "on")])
        .read(model)
        .unwrap();

    let merged = merge_values(&cli, &env, MergeStrategy::PreferBase);
    assert_eq!(merged.get_path("db.port"), Some(&Value::Integer(1)));
    assert_eq!(merged.get_path("debug"), Some(&Value::Bool(true)));

    let merged = merge_values(&cli, &env, MergeStrategy::PreferOverlay);
    assert_eq!(merged.get_path("db.port"), Some(&Value::Integer(2)));
}

#[test]
fn test_resolution_serializes_with_origins() {
    let resolution = Layered::builder()
        .with_source(EnvSource::from_vars("myapp", [("MYAPP_DB_HOST", "h")]))
        .without_defaults()
        .build(&appconfig())
        .unwrap()
        .read()
        .unwrap();

    let json = serde_json::to_value(&resolution).unwrap();
    assert_eq!(json["value"]["db"]["host"], "h");
    assert_eq!(json["origins"]["db.host"]["source"], "env");
    assert_eq!(json["origins"]["db.host"]["layer"], 0);
}
