use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use subfeed::app::AppContext;
use subfeed::cli::{commands, Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    // These two never touch the database or the network
    match &cli.command {
        Commands::Resolve { url } => return Ok(commands::resolve(url)?),
        Commands::Unpack { archive, dest } => {
            return Ok(commands::unpack(archive, dest.as_deref())?)
        }
        _ => {}
    }

    let mut ctx = AppContext::new(cli.config.as_deref())?;
    if let Some(workers) = cli.workers {
        ctx = ctx.with_workers(workers);
    }

    match cli.command {
        Commands::Poll => {
            commands::poll(&ctx).await?;
        }
        Commands::Watch {
            interval,
            no_initial_run,
        } => {
            commands::watch(&ctx, interval.as_deref(), no_initial_run).await?;
        }
        Commands::Fetch { urls } => {
            commands::fetch(&ctx, &urls).await?;
        }
        Commands::List { captions } => {
            if captions {
                commands::list_captions(&ctx)?;
            } else {
                commands::list_schedules(&ctx)?;
            }
        }
        Commands::Resolve { .. } | Commands::Unpack { .. } => {}
    }

    Ok(())
}
