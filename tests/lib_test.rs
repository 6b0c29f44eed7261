//! Library integration tests.

use statesman::StatesmanError;

#[test]
fn error_types_are_public() {
    let err = StatesmanError::InvalidKey {
        key: "1.5".into(),
        reason: "float key".into(),
    };
    assert!(err.to_string().contains("1.5"));
}

#[test]
fn result_type_alias_is_public() {
    fn test_fn() -> statesman::Result<()> {
        Ok(())
    }
    assert!(test_fn().is_ok());
}

#[test]
fn cli_types_are_public() {
    use clap::Parser;
    use statesman::cli::{Cli, Commands};

    let cli = Cli::parse_from(["statesman", "check", "--step", "mesh", "--json"]);

    if let Commands::Check(args) = cli.command {
        assert_eq!(args.step, "mesh");
        assert!(args.json);
    } else {
        panic!("Expected Check command");
    }
}
