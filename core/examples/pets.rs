//! Command-line parsing with a typed callback.
//!
//! Compiles a small `top dog|cat` command tree, prints its grammar and
//! turns each invocation into a `Pets` struct.
//!
//! # Usage
//!
//! ```bash
//! cargo run -p cligram-core --example pets -- top dog --dog-name fido --dog-color brown cat --cat-name felix
//! ```

use cligram_core::{App, CommandSchema, Fields, ParamSchema, Value};

#[derive(Debug, Default)]
struct Pets {
    dog: Option<(String, Vec<String>)>,
    cat: Option<String>,
}

fn text(value: Option<&Value>) -> String {
    value.and_then(Value::as_str).unwrap_or_default().to_string()
}

fn to_pets(fields: Fields) -> Pets {
    let mut pets = Pets::default();
    if let Some(dog) = fields.get("dog").and_then(|field| field.as_command()) {
        let colors = dog
            .value("dog_color")
            .and_then(Value::as_list)
            .unwrap_or_default()
            .iter()
            .filter_map(Value::as_str)
            .map(str::to_string)
            .collect();
        pets.dog = Some((text(dog.value("dog_name")), colors));
    }
    if let Some(cat) = fields.get("cat").and_then(|field| field.as_command()) {
        pets.cat = Some(text(cat.value("cat_name")));
    }
    pets
}

fn main() {
    let schema = CommandSchema::new("top")
        .with_subcommand(
            CommandSchema::new("dog")
                .with_param(ParamSchema::option(["--dog-name"]))
                .with_param(ParamSchema::option(["--dog-color"]).allow_multiple()),
        )
        .with_subcommand(CommandSchema::new("cat").with_param(ParamSchema::option(["--cat-name"])));

    let app = match App::new(&schema, to_pets) {
        Ok(app) => app,
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    };

    println!("Grammar ({}):\n{}", app.grammar().fingerprint(), app.grammar());

    let args: Vec<String> = std::env::args().skip(1).collect();
    let line = if args.is_empty() {
        "top dog --dog-name fido --dog-color brown --dog-color black cat --cat-name felix".to_string()
    } else {
        cligram_core::lexer::join_args(&args)
    };

    match app.invoke_str(&line) {
        Ok(pets) => println!("{line}\n  => {pets:?}"),
        Err(err) => {
            eprintln!("error: {err}");
            std::process::exit(1);
        }
    }
}
