//! Terminal driver for one reflection activity.
//!
//! ```text
//! ai-debate <activity> <character>[,<character>] [topic]
//! ```
//!
//! Lines typed while chatting are sent to the character (or, in dialogue
//! activities, to both characters as the moderator). `/end` moves on to the
//! reflection, whose lines are collected until `/submit`. The evaluation is
//! then requested and the transcript written to the export directory.
//! `/reset` starts over at any time and `/quit` leaves.

use std::process::ExitCode;
use std::sync::Arc;

use secrecy::ExposeSecret;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use ai_debate::adapters::{
    CatalogLocalizer, GeminiConfig, GeminiProvider, InMemoryApiKeyStore, LocalExportStorage,
    MarkdownTranscriptExporter,
};
use ai_debate::application::{
    AppContext, DialogueTurnCommand, EvaluationEvent, EvaluationRequester,
    ExportTranscriptHandler, PromptBuilder, SendMessageCommand, SendMessageError,
    SendMessageHandler, SharedSession, StartActivityCommand, StartActivityHandler,
};
use ai_debate::config::{AppConfig, LoggingConfig};
use ai_debate::domain::activity::{ActivityPhase, ActivityType, Persona};
use ai_debate::ports::{AIProvider, Localizer};

struct Args {
    activity: ActivityType,
    characters: Vec<String>,
    topic: Option<String>,
}

impl Args {
    fn parse() -> Result<Self, String> {
        let mut args = std::env::args().skip(1);
        let usage = "usage: ai-debate <activity> <character>[,<character>] [topic]";
        let activity = args
            .next()
            .ok_or(usage)?
            .parse::<ActivityType>()
            .map_err(|e| e.to_string())?;
        let characters = args
            .next()
            .ok_or(usage)?
            .split(',')
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .collect();
        let topic = {
            let rest: Vec<String> = args.collect();
            (!rest.is_empty()).then(|| rest.join(" "))
        };
        Ok(Self {
            activity,
            characters,
            topic,
        })
    }
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.log_level.clone()));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if logging.use_json() {
        builder.json().init();
    } else {
        builder.init();
    }
}

/// Everything one activity run needs.
struct Runner {
    prompts: PromptBuilder,
    chat: SendMessageHandler,
    evaluation: EvaluationRequester,
    export: ExportTranscriptHandler,
}

impl Runner {
    async fn chat(&self, session: &SharedSession, line: &str) -> Result<(), SendMessageError> {
        let is_dialogue = session.lock().await.activity_type().is_dialogue();
        let replies = if is_dialogue {
            let first = self
                .chat
                .handle_dialogue_turn(
                    session,
                    DialogueTurnCommand::new(0).with_moderator_message(line),
                )
                .await?;
            let second = self
                .chat
                .handle_dialogue_turn(session, DialogueTurnCommand::new(1))
                .await?;
            vec![first, second]
        } else {
            vec![self.chat.handle(session, SendMessageCommand::new(line)).await?]
        };

        for result in replies {
            let speaker = result
                .reply
                .character_name()
                .map(str::to_string)
                .unwrap_or_else(|| self.prompts.t("labels.ai", &[]));
            println!("{}: {}", speaker, result.reply.content());
        }
        Ok(())
    }

    async fn finish(&self, session: &SharedSession) {
        let (tx, mut rx) = mpsc::channel(32);
        let printer = tokio::spawn(async move {
            let mut shown = 0;
            while let Some(event) = rx.recv().await {
                match event {
                    EvaluationEvent::Partial { text } => {
                        print!("{}", &text[shown..]);
                        shown = text.len();
                    }
                    EvaluationEvent::Complete { text } | EvaluationEvent::Failed { text, .. } => {
                        if shown == 0 {
                            print!("{}", text);
                        }
                        println!();
                    }
                }
            }
        });

        let outcome = self.evaluation.request_evaluation_streaming(session, tx).await;
        let _ = printer.await;
        if let Err(err) = outcome {
            eprintln!("{}", err);
            return;
        }

        match self
            .export
            .handle(session, chrono::Local::now().date_naive())
            .await
        {
            Ok(saved) => println!("Transcript saved to {}", saved.path.display()),
            Err(err) => eprintln!("{}", err),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let config = match AppConfig::load() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };
    if let Err(err) = config.validate() {
        eprintln!("Invalid configuration: {}", err);
        return ExitCode::FAILURE;
    }
    init_tracing(&config.logging);

    let args = match Args::parse() {
        Ok(args) => args,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(2);
        }
    };

    match run(config, args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            tracing::error!(error = %err, "Activity aborted");
            ExitCode::FAILURE
        }
    }
}

async fn run(config: AppConfig, args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let locale = config.activity.locale()?;
    let context = AppContext::new(Arc::new(InMemoryApiKeyStore::new()));
    context.set_locale(locale);
    if let Some(key) = &config.ai.gemini_api_key {
        context.set_api_key(key.expose_secret());
    }
    if !context.has_api_key() {
        tracing::warn!("No Gemini API key configured, replies will use fallback texts");
    }

    let localizer: Arc<dyn Localizer> = Arc::new(CatalogLocalizer::embedded()?);
    let prompts = PromptBuilder::new(Arc::clone(&localizer), context.locale());

    let mut gemini = GeminiConfig::default()
        .with_model(config.ai.model.clone())
        .with_timeout(config.ai.timeout())
        .with_max_retries(config.ai.max_retries);
    if let Some(url) = &config.ai.base_url {
        gemini = gemini.with_base_url(url.clone());
    }
    let provider: Arc<dyn AIProvider> = Arc::new(GeminiProvider::new(gemini, context.api_keys())?);

    let exporter = MarkdownTranscriptExporter::new(Arc::clone(&localizer), context.locale())
        .with_brand(config.export.brand.clone());
    let storage = LocalExportStorage::new(config.export.output_dir.clone());

    let runner = Runner {
        prompts: prompts.clone(),
        chat: SendMessageHandler::new(Arc::clone(&provider), prompts.clone())
            .with_temperature(config.ai.temperature),
        evaluation: EvaluationRequester::new(Arc::clone(&provider), prompts.clone())
            .with_temperature(config.ai.temperature),
        export: ExportTranscriptHandler::new(Arc::new(exporter), Arc::new(storage)),
    };

    let mut command = StartActivityCommand::new(args.activity);
    for name in &args.characters {
        command = command.with_persona(Persona::new(name.as_str())?);
    }
    if let Some(topic) = args.topic {
        command = command.with_topic(topic);
    }
    let session = StartActivityHandler::new(prompts.clone())
        .with_min_messages_override(config.activity.min_messages_override)
        .with_min_reflection_chars(config.activity.min_reflection_chars)
        .handle(command)?;

    println!("# {}", prompts.activity_title(args.activity));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        match line {
            "" => continue,
            "/quit" => break,
            "/reset" => {
                session.lock().await.reset();
                println!("--");
                continue;
            }
            _ => {}
        }

        let phase = session.lock().await.phase();
        match (phase, line) {
            (ActivityPhase::Chatting, "/end") => {
                let mut guard = session.lock().await;
                match guard.end_chat() {
                    Ok(()) => {
                        for question in guard.reflection_questions() {
                            println!("- {}", question.text);
                        }
                    }
                    Err(failure) => eprintln!("{}", failure),
                }
            }
            (ActivityPhase::Chatting, text) => {
                if let Err(err) = runner.chat(&session, text).await {
                    match err {
                        SendMessageError::AIProvider { notice, .. } => println!("{}", notice),
                        other => eprintln!("{}", other),
                    }
                }
            }
            (ActivityPhase::Reflection, "/submit") => {
                let submitted = session.lock().await.submit_reflection();
                match submitted {
                    Ok(()) => runner.finish(&session).await,
                    Err(failure) => eprintln!("{}", failure),
                }
            }
            (ActivityPhase::Reflection, text) => {
                let mut guard = session.lock().await;
                let draft = if guard.reflection_draft().is_empty() {
                    text.to_string()
                } else {
                    format!("{}\n{}", guard.reflection_draft(), text)
                };
                guard.set_reflection_draft(draft)?;
            }
            (ActivityPhase::Feedback, _) => {
                println!("Activity complete. Type /reset to start over or /quit to leave.");
            }
        }
    }
    Ok(())
}
