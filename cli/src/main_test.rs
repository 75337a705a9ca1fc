use super::*;

fn base_config() -> ClientConfig {
    ClientConfig::from_vars(|name| match name {
        "HOME" => Some("/home/op".to_owned()),
        _ => None,
    })
    .unwrap()
}

#[test]
fn payload_must_be_an_object() {
    let map = parse_payload(r#" {"fecha": "2025-03-01", "hora": "08:00"} "#).unwrap();
    assert_eq!(map.get("hora"), Some(&Value::String("08:00".into())));
    assert!(matches!(parse_payload("[1, 2]"), Err(CliError::NotAnObject)));
    assert!(matches!(parse_payload("{"), Err(CliError::InvalidJson(_))));
}

#[test]
fn flags_override_environment() {
    let config = resolve_config(base_config(), Some("https://planta.example/"), Some("/tmp/s.json".into())).unwrap();
    assert_eq!(config.api_url, "https://planta.example");
    assert_eq!(config.storage_path, PathBuf::from("/tmp/s.json"));
}

#[test]
fn missing_flags_keep_environment() {
    let base = base_config();
    let config = resolve_config(base.clone(), None, None).unwrap();
    assert_eq!(config, base);
}

#[test]
fn bad_api_url_flag_is_rejected() {
    assert!(matches!(
        resolve_config(base_config(), Some("ftp://planta"), None),
        Err(CliError::Config(_))
    ));
}

#[test]
fn form_names_parse_as_kinds() {
    let cli = Cli::try_parse_from(["bitacora", "submit", "control-cloro", "--data", "{}"]).unwrap();
    match cli.command {
        Command::Submit(args) => {
            assert_eq!(args.form, FormKind::ControlCloro);
            assert_eq!(args.data.as_deref(), Some("{}"));
        }
        other => panic!("unexpected command {other:?}"),
    }
    assert!(Cli::try_parse_from(["bitacora", "submit", "cafeteria"]).is_err());
}

#[test]
fn export_takes_form_and_period() {
    let cli = Cli::try_parse_from(["bitacora", "records", "export", "consumo-diario", "2025-03-01"]).unwrap();
    let Command::Records(RecordsCommand { command: RecordsSubcommand::Export { form, period, output } }) = cli.command
    else {
        panic!("expected records export");
    };
    assert_eq!(form, FormKind::ConsumoDiario);
    assert_eq!(period, "2025-03-01");
    assert!(output.is_none());
}

#[test]
fn forbidden_names_the_redirect() {
    let error = CliError::Forbidden { path: "/admin".into(), redirect: routes::HOME_PATH };
    assert_eq!(error.to_string(), "access to /admin denied; go to /home");
}
