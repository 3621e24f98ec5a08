use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    auth,
    catalog::CoursePager,
    config::{load_settings_from, DEFAULT_SETTINGS_FILE},
    packages::discounted_price,
    CreatorApi, FileUpload, HttpCreatorApi, ProgressSink, Session, Settings, UploadProgress,
    WizardController,
};
use shared::domain::{ChapterId, CourseId};
use storage::SessionStore;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(about = "Course authoring client for the creator API")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    settings: PathBuf,
    /// Overrides `api_base_url` from the settings file.
    #[arg(long)]
    api_base_url: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    SendOtp {
        email: String,
    },
    Login {
        email: String,
        otp: String,
    },
    Logout,
    Whoami,
    Courses {
        #[arg(long, default_value_t = 0)]
        skip: u64,
        #[arg(long)]
        limit: Option<u64>,
    },
    Course {
        course_id: String,
        /// Print the raw course record.
        #[arg(long)]
        json: bool,
    },
    Publish {
        course_id: String,
        #[arg(long)]
        accept_terms: bool,
    },
    Unpublish {
        course_id: String,
    },
    DeleteCourse {
        course_id: String,
        /// Must read `delete <course name>`.
        #[arg(long)]
        confirm: String,
    },
    Tests {
        course_id: String,
    },
    Packages {
        course_id: String,
    },
    Upload {
        course_id: String,
        file: PathBuf,
    },
    ChapterContent {
        course_id: String,
        chapter_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    let mut settings = load_settings_from(&cli.settings, |name| std::env::var(name).ok());
    if let Some(base_url) = cli.api_base_url {
        settings.api_base_url = base_url;
    }

    let store = SessionStore::new(&settings.session_database_url)
        .await
        .context("failed to open session store")?;
    let session = Session::open(Arc::new(store)).await?;
    let api = Arc::new(HttpCreatorApi::new(&settings, session.clone())?);
    info!(api = %settings.api_base_url, "creator client ready");

    match cli.command {
        Command::SendOtp { email } => {
            auth::request_login_otp(api.as_ref(), &email).await?;
            println!("OTP sent to {}", email.trim());
        }
        Command::Login { email, otp } => {
            let tokens = auth::sign_in(api.as_ref(), &session, &email, &otp).await?;
            match tokens.uuid {
                Some(uuid) => println!("signed in as creator {uuid}"),
                None => println!("signed in"),
            }
        }
        Command::Logout => {
            auth::sign_out(&session).await?;
            println!("signed out");
        }
        Command::Whoami => {
            if !session.is_signed_in() {
                println!("not signed in");
            } else {
                match session.creator_uuid().await? {
                    Some(uuid) => println!("signed in as creator {uuid}"),
                    None => println!("signed in"),
                }
            }
        }
        Command::Courses { skip, limit } => {
            let mut pager =
                CoursePager::new(limit.unwrap_or(settings.page_size)).starting_at(skip);
            pager.load(api.as_ref()).await?;
            for course in pager.courses() {
                println!(
                    "{}\t{}\t{}",
                    course.id,
                    course.status.map_or("-", |status| status.as_str()),
                    course.name.as_deref().unwrap_or("(untitled)")
                );
            }
            println!(
                "showing {}-{} of {}",
                pager.showing_from(),
                pager.showing_to(),
                pager.total()
            );
        }
        Command::Course { course_id, json } => {
            let course_id = CourseId(course_id);
            if json {
                let record = api.get_course(&course_id).await?;
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                let wizard = open(api, &settings, &course_id).await?;
                print_course(&wizard).await;
            }
        }
        Command::Publish {
            course_id,
            accept_terms,
        } => {
            let wizard = open(api, &settings, &CourseId(course_id)).await?;
            wizard.set_terms_accepted(accept_terms).await;
            wizard.publish().await?;
            println!("published");
        }
        Command::Unpublish { course_id } => {
            let wizard = open(api, &settings, &CourseId(course_id)).await?;
            wizard.unpublish().await?;
            println!("moved back to draft");
        }
        Command::DeleteCourse { course_id, confirm } => {
            let wizard = open(api, &settings, &CourseId(course_id)).await?;
            wizard.delete_course(&confirm).await?;
            println!("deleted");
        }
        Command::Tests { course_id } => {
            let wizard = open(api, &settings, &CourseId(course_id)).await?;
            let tests = wizard.reload_tests().await?;
            if tests.is_empty() {
                println!("no tests");
            }
            for test in tests {
                println!(
                    "{}\t{:?}\t{}\t{}",
                    test.id,
                    test.kind,
                    test.status.as_deref().unwrap_or("-"),
                    test.title
                );
            }
        }
        Command::Packages { course_id } => {
            let wizard = open(api, &settings, &CourseId(course_id)).await?;
            for package in wizard.reload_packages().await? {
                println!(
                    "{}\t{}\tprice {} ({}% off, {})",
                    package.id.as_ref().map_or("-", |id| id.as_str()),
                    package.name,
                    package.price.unwrap_or_default(),
                    package.discount,
                    discounted_price(&package)
                );
            }
        }
        Command::Upload { course_id, file } => {
            let upload = FileUpload::read(&file).await?;
            upload.check_size()?;
            let sink: ProgressSink = Arc::new(|progress: UploadProgress| {
                eprint!("\ruploading {:>3}%", progress.percent());
            });
            let response = api
                .upload_course_file(&CourseId(course_id), upload, Some(sink))
                .await?;
            eprintln!();
            println!("{}", response.path);
        }
        Command::ChapterContent {
            course_id,
            chapter_id,
        } => {
            let wizard = open(api, &settings, &CourseId(course_id)).await?;
            let html = wizard
                .load_chapter_content(&ChapterId(chapter_id))
                .await?;
            println!("{html}");
        }
    }

    Ok(())
}

async fn open(
    api: Arc<HttpCreatorApi>,
    settings: &Settings,
    course_id: &CourseId,
) -> Result<Arc<WizardController>> {
    if !api.session().is_signed_in() {
        bail!("not signed in; run `login` first");
    }
    let wizard = WizardController::new(api, settings);
    wizard.open_course(course_id).await?;
    Ok(wizard)
}

async fn print_course(wizard: &WizardController) {
    let course = wizard.course().await;
    let flags = wizard.flags().await;
    println!(
        "{} [{}]",
        if course.name.is_empty() {
            "(untitled)"
        } else {
            course.name.as_str()
        },
        course.status.as_str()
    );
    if !course.description.is_empty() {
        println!("{}", course.description);
    }
    for subject in &course.subjects {
        println!(
            "  {} ({})",
            subject.name,
            subject.id.as_ref().map_or("unsaved", |id| id.as_str())
        );
        for chapter in &subject.chapters {
            println!(
                "    - {} [{:?}] {}",
                chapter.name,
                chapter.source.kind(),
                chapter.source.locator().unwrap_or_default()
            );
        }
    }
    println!(
        "course info {}, subjects {}, chapters {}",
        ready(flags.course),
        ready(flags.subjects),
        ready(flags.chapters)
    );
}

fn ready(valid: bool) -> &'static str {
    if valid {
        "ready"
    } else {
        "incomplete"
    }
}
