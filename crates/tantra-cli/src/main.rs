use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::Value;
use tantra_api::{LoginRequest, RegisterRequest};
use tantra_config::{Config, ConfigManager};
use tantra_core::{HealthState, UserRole};

mod app;
mod chat;

use app::App;

#[derive(Parser)]
#[command(name = "tantra")]
#[command(about = "Terminal console for the Tantra AGI backend")]
#[command(version)]
struct Cli {
    /// Enable debug logging
    #[arg(long, short, default_value = "false")]
    debug: bool,

    /// Config file path
    #[arg(long, env = "TANTRA_CONFIG", default_value = "~/.tantra/config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 启动交互式聊天
    Chat {
        /// 继续已有会话
        #[arg(long)]
        session: Option<String>,
        /// 开始新会话
        #[arg(long, default_value = "false")]
        new: bool,
    },
    /// 登录
    Login {
        username: String,
        /// 不提供时从标准输入读取
        #[arg(long, env = "TANTRA_PASSWORD")]
        password: Option<String>,
    },
    /// 注册新账号
    Register {
        username: String,
        email: String,
        #[arg(long, env = "TANTRA_PASSWORD")]
        password: Option<String>,
        /// 注册时只能选择 user 或 developer
        #[arg(long, value_enum)]
        role: Option<RegisterRole>,
    },
    /// 退出登录
    Logout,
    /// 显示当前用户
    Whoami,
    /// 本地会话管理
    Sessions(SessionsArgs),
    /// 错误日志
    Errors(ErrorsArgs),
    /// 系统状态快照
    Status,
    /// 后端健康检查
    Health,
    /// 管理员命令
    Admin(AdminArgs),
    /// 开发者命令
    Dev(DevArgs),
    /// 配置管理命令
    Config(ConfigArgs),
}

/// 自助注册可选的角色
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum RegisterRole {
    User,
    Developer,
}

impl From<RegisterRole> for UserRole {
    fn from(role: RegisterRole) -> Self {
        match role {
            RegisterRole::User => UserRole::User,
            RegisterRole::Developer => UserRole::Developer,
        }
    }
}

#[derive(Args, Clone)]
struct SessionsArgs {
    #[command(subcommand)]
    command: SessionCommands,
}

#[derive(Subcommand, Clone)]
enum SessionCommands {
    /// 列出本地会话
    List,
    /// 显示会话内容
    Show { id: String },
    /// 删除会话
    Delete { id: String },
    /// 新建会话并设为当前会话
    New,
    /// 服务端会话列表
    Remote,
    /// 服务端聊天记录
    History {
        #[arg(long)]
        session: Option<String>,
    },
    /// 清空服务端聊天记录
    ClearRemote {
        #[arg(long)]
        session: Option<String>,
    },
}

#[derive(Args, Clone)]
struct ErrorsArgs {
    #[command(subcommand)]
    command: ErrorCommands,
}

#[derive(Subcommand, Clone)]
enum ErrorCommands {
    /// 列出错误
    List {
        /// 包含已解决的错误
        #[arg(long, default_value = "false")]
        all: bool,
    },
    /// 标记为已解决
    Resolve { id: String },
    /// 清空错误日志
    Clear,
}

#[derive(Args, Clone)]
struct AdminArgs {
    #[command(subcommand)]
    command: AdminCommands,
}

#[derive(Subcommand, Clone)]
enum AdminCommands {
    Dashboard,
    Health,
    Logs {
        #[arg(long)]
        level: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// 查看服务端配置
    Config,
    /// 用 JSON 覆盖服务端配置
    SetConfig { json: String },
    Restart,
    Activity,
    Performance,
}

#[derive(Args, Clone)]
struct DevArgs {
    #[command(subcommand)]
    command: DevCommands,
}

#[derive(Subcommand, Clone)]
enum DevCommands {
    Dashboard,
    Metrics {
        #[arg(long)]
        component: Option<String>,
        #[arg(long)]
        category: Option<String>,
    },
    Debug { component: String },
    Traces {
        #[arg(long)]
        limit: Option<u32>,
    },
    Trigger { operation: String },
}

#[derive(Args, Clone)]
struct ConfigArgs {
    #[command(subcommand)]
    command: ConfigCommands,
}

#[derive(Subcommand, Clone)]
enum ConfigCommands {
    /// 获取配置值
    Get {
        /// 配置键 (如: api.base_url, realtime.reconnection_attempts)
        key: String,
    },
    /// 设置配置值
    Set { key: String, value: String },
    /// 初始化默认配置
    Init {
        /// 强制覆盖已有配置
        #[arg(long, default_value = "false")]
        force: bool,
    },
    /// 显示当前配置
    Show,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 展开配置文件路径
    let config_path =
        tantra_config::expand_tilde(&cli.config).unwrap_or_else(|| PathBuf::from(&cli.config));

    if cli.debug {
        eprintln!("{}", format!("[DEBUG] Config path: {:?}", config_path).dimmed());
    }

    let command = match cli.command {
        Commands::Config(args) => return handle_config(args, config_path).await,
        command => command,
    };

    let app = App::load(&config_path, cli.debug).await?;
    // 聊天模式自带通知打印任务
    let mut notes =
        (!matches!(command, Commands::Chat { .. })).then(|| app.notifier.subscribe());
    let result = match command {
        Commands::Chat { session, new } => chat::run(&app, session, new).await,
        Commands::Login { username, password } => login(&app, username, password).await,
        Commands::Register {
            username,
            email,
            password,
            role,
        } => register(&app, username, email, password, role).await,
        Commands::Logout => {
            app.auth.logout().await;
            Ok(())
        }
        Commands::Whoami => whoami(&app),
        Commands::Sessions(args) => handle_sessions(&app, args.command).await,
        Commands::Errors(args) => handle_errors(&app, args.command).await,
        Commands::Status => status(&app).await,
        Commands::Health => {
            print_json(&app.api.health_check().await?)?;
            Ok(())
        }
        Commands::Admin(args) => handle_admin(&app, args.command).await,
        Commands::Dev(args) => handle_dev(&app, args.command).await,
        Commands::Config(_) => Ok(()),
    };

    if let Some(rx) = notes.as_mut() {
        app::print_pending(rx);
    }
    app.persist().await;
    result
}

/// 未通过参数提供时在终端读取，不回显
async fn read_secret(prompt: &str, given: Option<String>) -> anyhow::Result<String> {
    if let Some(secret) = given {
        return Ok(secret);
    }
    let prompt = prompt.to_string();
    let secret = tokio::task::spawn_blocking(move || {
        dialoguer::Password::new().with_prompt(prompt).interact()
    })
    .await??;
    Ok(secret.trim().to_string())
}

async fn login(app: &App, username: String, password: Option<String>) -> anyhow::Result<()> {
    let password = read_secret("Password: ", password).await?;
    app.auth.login(&LoginRequest::new(username, password)).await?;
    Ok(())
}

async fn register(
    app: &App,
    username: String,
    email: String,
    password: Option<String>,
    role: Option<RegisterRole>,
) -> anyhow::Result<()> {
    let role = role.map(UserRole::from);
    let password = read_secret("Password: ", password).await?;

    app.auth
        .register(&RegisterRequest {
            username,
            email,
            password,
            role,
        })
        .await?;
    Ok(())
}

fn whoami(app: &App) -> anyhow::Result<()> {
    app.require(&app.guard(), "/profile")?;
    if let Some(user) = app.auth.user() {
        println!("{}", format!("👤 {} <{}>", user.username, user.email).cyan().bold());
        println!("{}", format!("Role: {}", user.role).dimmed());
        let permissions = if user.permissions.is_empty() {
            "None".to_string()
        } else {
            user.permissions.join(", ")
        };
        println!("{}", format!("Permissions: {}", permissions).dimmed());
    }
    Ok(())
}

async fn handle_sessions(app: &App, command: SessionCommands) -> anyhow::Result<()> {
    let store = &app.store;
    match command {
        SessionCommands::List => {
            let current = store.current_session_id();
            let sessions = store.sessions();
            if sessions.is_empty() {
                println!("{}", "No sessions yet".dimmed());
            }
            for session in sessions {
                let marker = if current.as_deref() == Some(session.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                println!(
                    "{} {}  {}  {}",
                    marker.green(),
                    session.id.dimmed(),
                    session.title.bold(),
                    format!(
                        "{} messages, updated {}",
                        session.message_count(),
                        session.updated_at.format("%Y-%m-%d %H:%M")
                    )
                    .dimmed()
                );
            }
        }
        SessionCommands::Show { id } => {
            let state = store.snapshot();
            let session = state
                .session(&id)
                .ok_or_else(|| anyhow::anyhow!("Unknown session: {}", id))?;
            println!("{}", format!("📋 {}", session.title).cyan().bold());
            for message in &session.messages {
                chat::print_message(message);
            }
        }
        SessionCommands::Delete { id } => {
            store.delete_session(&id);
            println!("{}", format!("✅ Deleted session {}", id).green());
        }
        SessionCommands::New => {
            store.save_current_session();
            let id = store.create_new_session();
            println!("{}", format!("✅ Session ID: {}", id).green());
        }
        SessionCommands::Remote => {
            app.require(&app.guard(), "/chat")?;
            print_json(&Value::Array(app.api.chat_sessions().await?))?;
        }
        SessionCommands::History { session } => {
            app.require(&app.guard(), "/chat")?;
            print_json(&Value::Array(app.api.chat_history(session.as_deref()).await?))?;
        }
        SessionCommands::ClearRemote { session } => {
            app.require(&app.guard(), "/chat")?;
            let result = app.api.clear_chat_history(session.as_deref()).await?;
            print_operation(result.success, &result.message);
        }
    }
    Ok(())
}

async fn handle_errors(app: &App, command: ErrorCommands) -> anyhow::Result<()> {
    let store = &app.store;
    match command {
        ErrorCommands::List { all } => {
            let errors: Vec<_> = store
                .errors()
                .into_iter()
                .filter(|e| all || !e.resolved)
                .collect();
            if errors.is_empty() {
                println!("{}", "No errors".green());
            }
            for entry in errors {
                let line = format!(
                    "{} [{}] {}",
                    entry.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    entry.category,
                    entry.message
                );
                if entry.resolved {
                    println!("{}  {}", entry.id.dimmed(), line.dimmed());
                } else {
                    println!("{}  {}", entry.id.dimmed(), line.red());
                }
                if let Some(details) = entry.details {
                    println!("    {}", details.to_string().dimmed());
                }
            }
        }
        ErrorCommands::Resolve { id } => {
            if !store.mark_error_resolved(&id) {
                anyhow::bail!("Unknown error id: {}", id);
            }
            println!("{}", "✅ Marked as resolved".green());
        }
        ErrorCommands::Clear => {
            store.clear_errors();
            println!("{}", "✅ Error log cleared".green());
        }
    }
    Ok(())
}

async fn status(app: &App) -> anyhow::Result<()> {
    app.require(&app.guard(), "/dashboard")?;

    let channel = app.channel();
    if !channel.load_initial_state().await {
        anyhow::bail!(app
            .store
            .error()
            .unwrap_or_else(|| "Failed to load system data".to_string()));
    }

    let state = app.store.snapshot();
    println!("{}", "📊 System Status".cyan().bold());
    if let Some(status) = state.system_status {
        let health = format!("{:?}", status.status);
        let health = match status.status {
            HealthState::Healthy => health.green(),
            HealthState::Warning => health.yellow(),
            HealthState::Error | HealthState::Offline => health.red(),
        };
        println!("  Status:       {}", health);
        println!("  Uptime:       {:.0}s", status.uptime);
        println!("  CPU:          {:.1}%", status.cpu_usage);
        println!("  Memory:       {:.1}%", status.memory_usage);
        println!("  Connections:  {}", status.active_connections);
    }
    if let Some(memory) = state.memory_stats {
        println!("{}", "🧠 Memory".cyan().bold());
        println!(
            "  {} total, {} recent, {} bytes",
            memory.total_memories, memory.recent_memories, memory.storage_size
        );
    }
    if let Some(learning) = state.learning_stats {
        println!("{}", "📈 Learning".cyan().bold());
        println!(
            "  {} experiences, rate {:.2}, adaptation {:.2}",
            learning.total_experiences, learning.learning_rate, learning.adaptation_score
        );
    }
    if let Some(evolution) = state.evolution_status {
        println!("{}", "🧬 Evolution".cyan().bold());
        println!(
            "  generation {}, fitness {:.2}, last {}",
            evolution.generation, evolution.fitness_score, evolution.last_evolution
        );
    }
    Ok(())
}

async fn handle_admin(app: &App, command: AdminCommands) -> anyhow::Result<()> {
    app.require(&app.guard().require_role(UserRole::Admin), "/admin")?;
    let api = &app.api;
    match command {
        AdminCommands::Dashboard => print_json(&api.admin_dashboard().await?)?,
        AdminCommands::Health => print_json(&api.system_health().await?)?,
        AdminCommands::Logs { level, limit } => {
            print_json(&Value::Array(api.system_logs(level.as_deref(), limit).await?))?
        }
        AdminCommands::Config => print_json(&api.configuration().await?)?,
        AdminCommands::SetConfig { json } => {
            let value: Value = serde_json::from_str(&json)?;
            let result = api.update_configuration(&value).await?;
            print_operation(result.success, &result.message);
        }
        AdminCommands::Restart => {
            let result = api.restart_system().await?;
            print_operation(result.success, &result.message);
        }
        AdminCommands::Activity => print_json(&Value::Array(api.user_activity().await?))?,
        AdminCommands::Performance => print_json(&api.performance_metrics().await?)?,
    }
    Ok(())
}

async fn handle_dev(app: &App, command: DevCommands) -> anyhow::Result<()> {
    app.require(&app.guard().require_role(UserRole::Developer), "/developer")?;
    let api = &app.api;
    match command {
        DevCommands::Dashboard => print_json(&api.developer_dashboard().await?)?,
        DevCommands::Metrics {
            component,
            category,
        } => print_json(&Value::Array(
            api.developer_metrics(component.as_deref(), category.as_deref())
                .await?,
        ))?,
        DevCommands::Debug { component } => print_json(&api.debug_info(&component).await?)?,
        DevCommands::Traces { limit } => {
            print_json(&Value::Array(api.system_traces(limit).await?))?
        }
        DevCommands::Trigger { operation } => {
            let result = api.trigger_debug_operation(&operation).await?;
            print_operation(result.success, &result.message);
        }
    }
    Ok(())
}

async fn handle_config(args: ConfigArgs, config_path: PathBuf) -> anyhow::Result<()> {
    match args.command {
        ConfigCommands::Get { key } => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            match config.get_value(&key) {
                Some(value) => {
                    println!("{}", format!("{} = {}", key, value).green());
                }
                None => {
                    println!("{}", format!("❌ Key not found: {}", key).red());
                    std::process::exit(1);
                }
            }
        }
        ConfigCommands::Set { key, value } => {
            let manager = ConfigManager::load(&config_path).await?;
            if let Err(e) = manager.update(|config| config.set_value(&key, &value)).await {
                println!("{}", format!("❌ Failed to set value: {}", e).red());
                std::process::exit(1);
            }
            println!("{}", format!("✅ Set {} = {}", key, value).green());
        }
        ConfigCommands::Init { force } => {
            if config_path.exists() && !force {
                println!(
                    "{}",
                    format!("⚠️  Config already exists at {:?}", config_path).yellow()
                );
                println!("{}", "Use --force to overwrite".dimmed());
                return Ok(());
            }

            tantra_config::init_tantra_dirs().await?;
            let manager = ConfigManager::new(Config::default(), config_path.clone());
            manager.save().await?;

            println!(
                "{}",
                format!("✅ Config initialized at {:?}", config_path).green()
            );
            println!("{}", "You can edit this file to customize your settings".dimmed());
        }
        ConfigCommands::Show => {
            let manager = ConfigManager::load(&config_path).await?;
            let config = manager.snapshot().await;

            println!("{}", "📋 Current Configuration:".cyan().bold());
            println!();
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }
    Ok(())
}

fn print_json(value: &Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_operation(success: bool, message: &str) {
    if success {
        println!("{}", format!("✅ {}", message).green());
    } else {
        println!("{}", format!("❌ {}", message).red());
    }
}
