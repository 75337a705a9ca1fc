use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use bitacora::config::{ClientConfig, ConfigError, parse_api_url};
use bitacora::menu;
use bitacora::net::api::{ApiClient, ApiError, AuthBackend};
use bitacora::net::types::{NewUsuario, ProfileUpdate, UsuarioUpdate};
use bitacora::records::{FormKind, RecordError, RecordFilter};
use bitacora::routes::{self, LogNavigator, Navigator};
use bitacora::state::auth::{AuthError, AuthManager};
use bitacora::state::guard::{GuardDecision, RouteGuard};
use bitacora::state::token_store::{FileStorage, TokenStore};
use clap::{Args, Parser, Subcommand};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Api(#[from] ApiError),
    #[error(transparent)]
    Record(#[from] RecordError),
    #[error("access to {path} denied; go to {redirect}")]
    Forbidden { path: String, redirect: &'static str },
    #[error("missing expected field `{0}`")]
    MissingField(&'static str),
    #[error("payload must be a JSON object")]
    NotAnObject,
    #[error("invalid JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("i/o failed: {0}")]
    Io(#[from] io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "bitacora", about = "Water-treatment plant operations log")]
struct Cli {
    /// Backend origin; overrides BITACORA_API_URL.
    #[arg(long)]
    api_url: Option<String>,

    /// Credential storage file; overrides BITACORA_STORAGE_PATH.
    #[arg(long)]
    storage: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    Login {
        #[arg(long)]
        username: String,
        #[arg(long, env = "BITACORA_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    /// Session phase and the signed-in user, without touching the guard.
    Status,
    Whoami,
    /// Run the route guard against a path.
    Open { path: String },
    /// Sidebar and home shortcuts visible to the signed-in user.
    Menu,
    Submit(SubmitArgs),
    Records(RecordsCommand),
    Users(UsersCommand),
    Roles {
        /// Include inactive roles.
        #[arg(long, default_value_t = false)]
        all: bool,
    },
    Profile(ProfileCommand),
}

#[derive(Args, Debug)]
struct SubmitArgs {
    form: FormKind,
    /// Inline JSON object.
    #[arg(long, conflicts_with = "input")]
    data: Option<String>,
    /// File holding a JSON object, or - for stdin.
    #[arg(long, default_value = "-")]
    input: String,
}

#[derive(Args, Debug)]
struct RecordsCommand {
    #[command(subcommand)]
    command: RecordsSubcommand,
}

#[derive(Subcommand, Debug)]
enum RecordsSubcommand {
    List {
        form: FormKind,
        #[arg(long)]
        fecha_inicio: Option<String>,
        #[arg(long)]
        fecha_fin: Option<String>,
        #[arg(long)]
        mes: Option<u32>,
        #[arg(long)]
        anio: Option<i32>,
        #[arg(long)]
        quimico: Option<String>,
    },
    Export {
        form: FormKind,
        /// `YYYY-MM` for chlorine control, `YYYY-MM-DD` for the rest.
        period: String,
        /// Defaults to the report's usual file name.
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Args, Debug)]
struct UsersCommand {
    #[command(subcommand)]
    command: UsersSubcommand,
}

#[derive(Subcommand, Debug)]
enum UsersSubcommand {
    List {
        #[arg(long)]
        activo: Option<bool>,
        #[arg(long)]
        rol: Option<String>,
    },
    Show {
        id: i64,
    },
    Create(CreateUserArgs),
    Update(UpdateUserArgs),
    Delete {
        id: i64,
    },
    Activate {
        id: i64,
    },
}

#[derive(Args, Debug)]
struct CreateUserArgs {
    #[arg(long)]
    username: String,
    #[arg(long, env = "BITACORA_NEW_PASSWORD", hide_env_values = true)]
    password: String,
    #[arg(long)]
    nombre: String,
    #[arg(long)]
    apellido: String,
    #[arg(long)]
    rol_id: i64,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    telefono: Option<String>,
    #[arg(long)]
    fecha_contratacion: Option<String>,
    #[arg(long, default_value_t = false)]
    inactive: bool,
}

#[derive(Args, Debug)]
struct UpdateUserArgs {
    id: i64,
    #[arg(long)]
    nombre: Option<String>,
    #[arg(long)]
    apellido: Option<String>,
    #[arg(long)]
    username: Option<String>,
    #[arg(long)]
    email: Option<String>,
    #[arg(long)]
    telefono: Option<String>,
    #[arg(long)]
    rol_id: Option<i64>,
    #[arg(long)]
    activo: Option<bool>,
    #[arg(long)]
    fecha_contratacion: Option<String>,
    #[arg(long)]
    password: Option<String>,
}

#[derive(Args, Debug)]
struct ProfileCommand {
    #[command(subcommand)]
    command: ProfileSubcommand,
}

#[derive(Subcommand, Debug)]
enum ProfileSubcommand {
    Update {
        #[arg(long)]
        nombre: Option<String>,
        #[arg(long)]
        email: Option<String>,
        /// Image file to upload as the profile photo.
        #[arg(long)]
        photo: Option<PathBuf>,
    },
}

/// Everything a command needs; built once per process.
struct App {
    api: ApiClient,
    auth: AuthManager,
    guard: RouteGuard,
}

impl App {
    fn new(config: &ClientConfig) -> Result<Self, CliError> {
        let api = ApiClient::from_config(config)?;
        let tokens = TokenStore::new(Arc::new(FileStorage::new(&config.storage_path)));
        let backend: Arc<dyn AuthBackend> = Arc::new(api.clone());
        let navigator: Arc<dyn Navigator> = Arc::new(LogNavigator);
        let auth = AuthManager::new(tokens, backend, navigator, config.auth);
        let guard = RouteGuard::new(auth.clone());
        Ok(Self { api, auth, guard })
    }

    /// Pass the guard for `path` and hand back the bearer token.
    async fn enter(&self, path: &str) -> Result<String, CliError> {
        let forbidden = |redirect| CliError::Forbidden { path: path.to_owned(), redirect };
        match self.guard.check_path(path).await {
            GuardDecision::Allow => self.auth.token().ok_or_else(|| forbidden(routes::LOGIN_PATH)),
            GuardDecision::Redirect(to) => Err(forbidden(to)),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    // A missing .env file is the normal case.
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let config = resolve_config(ClientConfig::from_env()?, cli.api_url.as_deref(), cli.storage)?;
    let app = App::new(&config)?;
    app.auth.initialize().await;

    match cli.command {
        Command::Login { username, password } => run_login(&app, &username, &password).await,
        Command::Logout => {
            app.auth.logout();
            println!("signed out");
            Ok(())
        }
        Command::Status => run_status(&app),
        Command::Whoami => run_whoami(&app).await,
        Command::Open { path } => run_open(&app, &path).await,
        Command::Menu => run_menu(&app).await,
        Command::Submit(args) => run_submit(&app, args).await,
        Command::Records(records) => run_records(&app, records).await,
        Command::Users(users) => run_users(&app, users).await,
        Command::Roles { all } => {
            let token = app.enter("/admin").await?;
            let roles = app.api.list_roles(&token, !all).await?;
            print_json(&serde_json::to_value(roles)?)
        }
        Command::Profile(profile) => run_profile(&app, profile).await,
    }
}

fn resolve_config(
    mut config: ClientConfig,
    api_url: Option<&str>,
    storage: Option<PathBuf>,
) -> Result<ClientConfig, CliError> {
    if api_url.is_some() {
        config.api_url = parse_api_url(api_url)?;
    }
    if let Some(storage) = storage {
        config.storage_path = storage;
    }
    Ok(config)
}

async fn run_login(app: &App, username: &str, password: &str) -> Result<(), CliError> {
    app.auth.login(username, password).await?;
    match app.auth.current_user() {
        Some(user) => println!("signed in as {} ({})", user.display_name(), user.rol.display_name()),
        None => println!("signed in; profile could not be loaded yet"),
    }
    Ok(())
}

fn run_status(app: &App) -> Result<(), CliError> {
    print_json(&json!({
        "phase": format!("{:?}", app.auth.phase()),
        "hydrated": app.auth.hydration_settled(),
        "user": app.auth.current_user().map(|u| u.username),
    }))
}

async fn run_whoami(app: &App) -> Result<(), CliError> {
    app.enter("/profile").await?;
    let user = app.auth.current_user().ok_or(CliError::MissingField("user"))?;
    let mut value = serde_json::to_value(&user)?;
    if let (Some(map), Some(photo)) = (value.as_object_mut(), user.foto_perfil.as_deref()) {
        map.insert("foto_url".to_owned(), Value::String(app.api.asset_url(photo)));
    }
    print_json(&value)
}

async fn run_open(app: &App, path: &str) -> Result<(), CliError> {
    let decision = app.guard.check_path(path).await;
    let rendered = match decision {
        GuardDecision::Allow => json!({ "path": path, "decision": "allow" }),
        GuardDecision::Redirect(to) => json!({ "path": path, "decision": "redirect", "to": to }),
    };
    print_json(&rendered)
}

async fn run_menu(app: &App) -> Result<(), CliError> {
    app.enter(routes::HOME_PATH).await?;
    let user = app.auth.current_user();
    let sidebar: Vec<Value> = menu::visible_sidebar(user.as_ref())
        .into_iter()
        .map(|entry| {
            let children: Vec<Value> = entry
                .children
                .iter()
                .map(|child| json!({ "label": child.label, "route": child.route }))
                .collect();
            json!({ "label": entry.item.label, "route": entry.item.route, "children": children })
        })
        .collect();
    let actions: Vec<Value> = menu::visible_quick_actions(user.as_ref())
        .into_iter()
        .map(|action| json!({ "title": action.title, "description": action.description, "route": action.route }))
        .collect();
    print_json(&json!({ "sidebar": sidebar, "quick_actions": actions }))
}

async fn run_submit(app: &App, args: SubmitArgs) -> Result<(), CliError> {
    let token = app.enter(args.form.form_route()).await?;
    let raw = match args.data {
        Some(data) => data,
        None => read_input(&args.input)?,
    };
    let payload = args.form.prepare(parse_payload(&raw)?, app.auth.current_user().as_ref())?;
    let created = app.api.submit_record(&token, args.form, &payload).await?;
    tracing::info!(form = %args.form, "record submitted");
    print_json(&created)
}

async fn run_records(app: &App, records: RecordsCommand) -> Result<(), CliError> {
    match records.command {
        RecordsSubcommand::List { form, fecha_inicio, fecha_fin, mes, anio, quimico } => {
            let token = app.enter(form.report_route()).await?;
            let filter = RecordFilter { fecha_inicio, fecha_fin, mes, anio, quimico };
            let rows = app.api.list_records(&token, form, &filter).await?;
            print_json(&Value::Array(rows))
        }
        RecordsSubcommand::Export { form, period, output } => {
            let token = app.enter(form.report_route()).await?;
            let bytes = app.api.export_excel(&token, form, &period).await?;
            let output = output.unwrap_or_else(|| PathBuf::from(form.export_file_name(&period)));
            std::fs::write(&output, &bytes)?;
            println!("wrote {} bytes to {}", bytes.len(), output.display());
            Ok(())
        }
    }
}

async fn run_users(app: &App, users: UsersCommand) -> Result<(), CliError> {
    let token = app.enter("/admin").await?;
    match users.command {
        UsersSubcommand::List { activo, rol } => {
            let list = app.api.list_users(&token, activo, rol.as_deref()).await?;
            print_json(&serde_json::to_value(list)?)
        }
        UsersSubcommand::Show { id } => print_json(&serde_json::to_value(app.api.get_user(&token, id).await?)?),
        UsersSubcommand::Create(args) => {
            let usuario = NewUsuario {
                nombre: args.nombre,
                apellido: args.apellido,
                email: args.email,
                telefono: args.telefono,
                username: args.username,
                password: args.password,
                rol_id: args.rol_id,
                activo: !args.inactive,
                fecha_contratacion: args.fecha_contratacion,
            };
            print_json(&serde_json::to_value(app.api.create_user(&token, &usuario).await?)?)
        }
        UsersSubcommand::Update(args) => {
            let update = UsuarioUpdate {
                nombre: args.nombre,
                apellido: args.apellido,
                username: args.username,
                email: args.email,
                telefono: args.telefono,
                rol_id: args.rol_id,
                activo: args.activo,
                fecha_contratacion: args.fecha_contratacion,
                password: args.password,
            };
            let updated = app.api.update_user(&token, args.id, &update).await?;
            sync_session_if_self(app, &updated);
            print_json(&serde_json::to_value(updated)?)
        }
        UsersSubcommand::Delete { id } => {
            app.api.delete_user(&token, id).await?;
            print_json(&json!({ "deleted": id }))
        }
        UsersSubcommand::Activate { id } => {
            print_json(&serde_json::to_value(app.api.activate_user(&token, id).await?)?)
        }
    }
}

async fn run_profile(app: &App, profile: ProfileCommand) -> Result<(), CliError> {
    let token = app.enter("/profile").await?;
    match profile.command {
        ProfileSubcommand::Update { nombre, email, photo } => {
            let user = app.auth.current_user().ok_or(CliError::MissingField("user"))?;
            let id = user.id.ok_or(CliError::MissingField("id"))?;
            let nombre = nombre.unwrap_or(user.nombre);
            let email = email.or(user.email).unwrap_or_default();
            let photo = photo.as_deref().map(read_photo).transpose()?;
            let updated = app.api.update_profile(&token, id, &nombre, &email, photo).await?;
            app.auth.update_current_user(&ProfileUpdate::from(&updated));
            print_json(&serde_json::to_value(updated)?)
        }
    }
}

/// Keep the sidebar/profile view current when an admin edits their own row.
fn sync_session_if_self(app: &App, updated: &bitacora::net::types::Usuario) {
    if app.auth.current_user().and_then(|u| u.id) == Some(updated.id) {
        app.auth.update_current_user(&ProfileUpdate::from(updated));
    }
}

fn parse_payload(raw: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str::<Value>(raw.trim())? {
        Value::Object(map) => Ok(map),
        _ => Err(CliError::NotAnObject),
    }
}

fn read_input(input: &str) -> Result<String, CliError> {
    if input == "-" {
        let mut buffer = String::new();
        io::stdin().read_to_string(&mut buffer)?;
        return Ok(buffer);
    }
    Ok(std::fs::read_to_string(input)?)
}

fn read_photo(path: &Path) -> Result<(String, Vec<u8>), CliError> {
    let bytes = std::fs::read(path)?;
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("foto")
        .to_owned();
    Ok((file_name, bytes))
}

fn print_json(value: &Value) -> Result<(), CliError> {
    let rendered = serde_json::to_string_pretty(value)?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
#[path = "main_test.rs"]
mod main_test;
