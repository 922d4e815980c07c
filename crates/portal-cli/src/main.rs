//! `portal` command-line tool
//!
//! Reads `PORTAL_*` configuration from the environment, opens the configured
//! backend and drives the controller for maintenance and demo tasks.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use portal_core::{BackendKind, CounterOutcome, PortalConfig, PortalController};
use portal_model::{ArticleCategory, ArticleDraft, FeaturedMedia, MediaInput, MeetingKind, RecordId};
use portal_store::seed_if_empty;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn cli() -> Command {
    let guest_name = Arg::new("as")
        .long("as")
        .default_value("cli")
        .help("Guest name to sign in with");

    Command::new("portal")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Content portal maintenance tool")
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(Command::new("seed").about("Fill an empty store with starter content"))
        .subcommand(
            Command::new("list")
                .about("Print a collection, newest first")
                .arg(
                    Arg::new("collection")
                        .required(true)
                        .value_parser(["articles", "meetings", "media", "guests"])
                        .help("Collection to print"),
                )
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("publish")
                .about("Publish an article as admin")
                .arg(Arg::new("title").long("title").required(true).help("Headline"))
                .arg(Arg::new("body").long("body").required(true).help("Body text"))
                .arg(
                    Arg::new("media-url")
                        .long("media-url")
                        .required(true)
                        .help("Hosted URL or data: URL of the featured media"),
                )
                .arg(
                    Arg::new("media-name")
                        .long("media-name")
                        .help("File name shown for the media (default: last URL segment)"),
                )
                .arg(
                    Arg::new("mime")
                        .long("mime")
                        .help("MIME type of a hosted URL (default: guessed from the extension)"),
                )
                .arg(
                    Arg::new("upload")
                        .long("upload")
                        .action(ArgAction::SetTrue)
                        .help("Decode a data: URL and store it in the blob store"),
                )
                .arg(
                    Arg::new("category")
                        .long("category")
                        .default_value("state")
                        .help("state, national, local-events, government-schemes or party-activities"),
                ),
        )
        .subcommand(
            Command::new("view")
                .about("Open an article as a guest, counting the view")
                .arg(Arg::new("id").required(true).help("Article id"))
                .arg(guest_name.clone()),
        )
        .subcommand(
            Command::new("click")
                .about("Count an outbound social link click as a guest")
                .arg(Arg::new("id").required(true).help("Article id"))
                .arg(
                    Arg::new("platform")
                        .required(true)
                        .help("fb, insta or x"),
                )
                .arg(guest_name),
        )
        .subcommand(
            Command::new("block")
                .about("Block a guest name")
                .arg(Arg::new("name").required(true).num_args(1..).help("Guest name")),
        )
        .subcommand(
            Command::new("unblock")
                .about("Unblock a guest name")
                .arg(Arg::new("name").required(true).num_args(1..).help("Guest name")),
        )
        .arg(
            Arg::new("retries")
                .long("counter-retries")
                .global(true)
                .value_parser(value_parser!(u32))
                .help("Override PORTAL_COUNTER_RETRIES"),
        )
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,portal_core=info"));
    let json = std::env::var("PORTAL_LOG_JSON").is_ok_and(|v| v == "1" || v.eq_ignore_ascii_case("true"));

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let matches = cli().get_matches();

    let mut config = PortalConfig::from_env().context("reading PORTAL_* configuration")?;
    if let Some(retries) = matches.get_one::<u32>("retries") {
        config = config.with_counter_retries(*retries);
    }
    if config.backend == BackendKind::Memory {
        warn!("memory backend selected; nothing will outlive this process");
    }

    let portal = PortalController::from_config(&config)
        .await
        .context("opening portal backends")?;

    match matches.subcommand() {
        Some(("seed", _)) => seed(&portal).await,
        Some(("list", args)) => list(&portal, &config, args).await,
        Some(("publish", args)) => publish(&portal, &config, args).await,
        Some(("view", args)) => view(&portal, args).await,
        Some(("click", args)) => click(&portal, args).await,
        Some(("block", args)) => set_blocked(&portal, &config, args, true).await,
        Some(("unblock", args)) => set_blocked(&portal, &config, args, false).await,
        _ => unreachable!("subcommand_required"),
    }
}

async fn seed(portal: &PortalController) -> Result<()> {
    let report = seed_if_empty(portal.store().as_ref(), Utc::now())
        .await
        .context("seeding store")?;
    if report.is_empty() {
        println!("Store already has content; nothing seeded.");
    } else {
        println!(
            "Seeded {} articles, {} meetings{}",
            report.articles,
            report.meetings,
            if report.social_links { " and social links" } else { "" }
        );
    }
    Ok(())
}

async fn sign_in_admin(portal: &PortalController, config: &PortalConfig) -> Result<()> {
    portal
        .sign_in_admin(&config.admin_secret)
        .await
        .context("signing in as admin")?;
    if let Some(err) = portal.state().last_load_error {
        bail!("loading portal data failed: {err}");
    }
    Ok(())
}

async fn sign_in_guest(portal: &PortalController, args: &ArgMatches) -> Result<()> {
    let name = args.get_one::<String>("as").map_or("cli", String::as_str);
    portal
        .sign_in_guest(name)
        .await
        .with_context(|| format!("signing in as guest {name:?}"))?;
    if let Some(err) = portal.state().last_load_error {
        bail!("loading portal data failed: {err}");
    }
    Ok(())
}

async fn list(portal: &PortalController, config: &PortalConfig, args: &ArgMatches) -> Result<()> {
    sign_in_admin(portal, config).await?;
    let state = portal.state();
    let json = args.get_flag("json");
    let collection = args.get_one::<String>("collection").map_or("articles", String::as_str);

    if json {
        let value = match collection {
            "articles" => serde_json::to_value(&state.articles)?,
            "meetings" => serde_json::to_value(&state.meetings)?,
            "media" => serde_json::to_value(&state.media_assets)?,
            _ => serde_json::to_value(&state.guests)?,
        };
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    match collection {
        "articles" => {
            for a in &state.articles {
                println!(
                    "{}  {}  [{}]  views={} fb={} insta={} x={}",
                    a.id,
                    a.published_at.format("%Y-%m-%d"),
                    a.category.label(),
                    a.views,
                    a.link_clicks.fb,
                    a.link_clicks.insta,
                    a.link_clicks.x
                );
                println!("    {}", a.title);
            }
        }
        "meetings" => {
            for kind in [MeetingKind::Meeting, MeetingKind::Activity] {
                let split = portal.meeting_partition(kind);
                println!("{}", kind.list_title());
                for (label, entries) in [("Upcoming", &split.upcoming), ("Past", &split.past)] {
                    println!("  {label}:");
                    for m in entries {
                        println!("    {}  {}  {} @ {}", m.id, m.starts_at.format("%Y-%m-%d %H:%M"), m.title, m.location);
                    }
                }
            }
        }
        "media" => {
            for asset in &state.media_assets {
                println!(
                    "{}  [{}]  {}  {}",
                    asset.id,
                    asset.category.label(),
                    asset.title,
                    asset.file.url
                );
            }
        }
        _ => {
            for guest in &state.guests {
                println!("{}  {}{}", guest.id, guest.name, if guest.blocked { "  (blocked)" } else { "" });
            }
        }
    }
    Ok(())
}

async fn publish(portal: &PortalController, config: &PortalConfig, args: &ArgMatches) -> Result<()> {
    let title = args.get_one::<String>("title").map_or("", String::as_str);
    let body = args.get_one::<String>("body").map_or("", String::as_str);
    let url = args.get_one::<String>("media-url").map_or("", String::as_str);
    let name = args
        .get_one::<String>("media-name")
        .cloned()
        .unwrap_or_else(|| file_name_of(url));
    let category: ArticleCategory = args
        .get_one::<String>("category")
        .map_or("state", String::as_str)
        .parse()
        .map_err(anyhow::Error::msg)
        .context("parsing --category")?;

    let media = if args.get_flag("upload") {
        MediaInput::from_data_url(name, url).context("decoding --media-url")?
    } else {
        let mime = args
            .get_one::<String>("mime")
            .cloned()
            .unwrap_or_else(|| guess_mime(url).to_string());
        MediaInput::Linked(FeaturedMedia::new(url, name, mime))
    };

    sign_in_admin(portal, config).await?;
    let article = portal
        .create_article(
            ArticleDraft::new(title, body)
                .with_category(category)
                .with_media(media),
        )
        .await
        .context("publishing article")?;

    info!(article_id = %article.id, "Published from CLI");
    println!("{}", article.id);
    Ok(())
}

async fn view(portal: &PortalController, args: &ArgMatches) -> Result<()> {
    sign_in_guest(portal, args).await?;
    let id = record_id(args);
    let outcome = portal.select_article(&id).await.context("opening article")?;
    let views = portal.state().selected_article.map_or(0, |a| a.views);
    report_counter("views", outcome, views);
    Ok(())
}

async fn click(portal: &PortalController, args: &ArgMatches) -> Result<()> {
    sign_in_guest(portal, args).await?;
    let id = record_id(args);
    let platform = args.get_one::<String>("platform").map_or("", String::as_str);
    let outcome = portal
        .increment_link_click(&id, platform)
        .await
        .context("counting link click")?;
    let clicks = portal
        .state()
        .article(&id)
        .and_then(|a| platform.parse().ok().map(|p| a.link_clicks.get(p)))
        .unwrap_or_default();
    report_counter(platform, outcome, clicks);
    Ok(())
}

async fn set_blocked(portal: &PortalController, config: &PortalConfig, args: &ArgMatches, blocked: bool) -> Result<()> {
    let name = args
        .get_many::<String>("name")
        .map(|parts| parts.map(String::as_str).collect::<Vec<_>>().join(" "))
        .unwrap_or_default();
    sign_in_admin(portal, config).await?;
    let guest = portal
        .set_guest_blocked(&name, blocked)
        .await
        .with_context(|| format!("updating guest {name:?}"))?;
    println!("{} is now {}", guest.name, if guest.blocked { "blocked" } else { "allowed" });
    Ok(())
}

fn record_id(args: &ArgMatches) -> RecordId {
    args.get_one::<String>("id").map(String::as_str).unwrap_or_default().into()
}

fn report_counter(counter: &str, outcome: CounterOutcome, local: u64) {
    match outcome {
        CounterOutcome::Persisted(value) => println!("{counter}: {value}"),
        CounterOutcome::RolledBack => println!("{counter}: {local} (increment not saved)"),
        CounterOutcome::Discarded => println!("{counter}: session ended before the count was saved"),
    }
}

fn file_name_of(url: &str) -> String {
    if url.starts_with("data:") {
        return "media".to_string();
    }
    url.split(['?', '#'])
        .next()
        .and_then(|path| path.rsplit('/').next())
        .filter(|segment| !segment.is_empty())
        .unwrap_or("media")
        .to_string()
}

fn guess_mime(url: &str) -> &'static str {
    if let Some(header) = url.strip_prefix("data:").and_then(|rest| rest.split([';', ',']).next()) {
        return match header {
            "image/png" => "image/png",
            "image/gif" => "image/gif",
            "image/webp" => "image/webp",
            "video/mp4" => "video/mp4",
            "application/pdf" => "application/pdf",
            _ => "image/jpeg",
        };
    }
    let lower = url.split(['?', '#']).next().unwrap_or(url).to_ascii_lowercase();
    match lower.rsplit('.').next() {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("pdf") => "application/pdf",
        _ => "image/jpeg",
    }
}
