#[cfg(test)]
#[path = "terminal_test.rs"]
mod tests;

use std::future::Future;
use std::io::Write;
use std::process;
use std::sync::Arc;
use std::sync::Mutex;

use anyhow::bail;
use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use dialoguer::Select;
use tokio::io::AsyncBufReadExt;
use tokio::io::BufReader;
use tokio::io::Lines;
use tokio::io::Stdin;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use yansi::Paint;

use crate::configuration::Config;
use crate::configuration::ConfigKey;
use crate::domain::models::EndReason;
use crate::domain::models::Event;
use crate::domain::models::ScenarioTopic;
use crate::domain::services::Consultation;
use crate::domain::services::TurnOutcome;
use crate::domain::services::QUIT_COMMAND;

pub const DISCLAIMER: &str = "IMPORTANT DISCLAIMER:

This OSCE Patient Simulator is for EDUCATIONAL PRACTICE ONLY. It is NOT a substitute for professional medical advice, clinical supervision, or official pharmacy guidelines.

DO NOT use this tool for real patient care. Information provided by the AI is for simulation purposes only and may not be accurate, complete, or even fabricated (AI hallucination).

Always refer to official sources (e.g., BNF, NICE) and consult qualified professionals for medical guidance.";

pub const DESCRIPTION: &str = "Welcome to your Pharmacy OSCE Patient Simulator!

Practise and refine your consultation skills in a safe, simulated environment, preparing you for Objective Structured Clinical Examinations (OSCEs) and real-world practice as an independent prescriber.

How it works:

1. Choose your scenario. Pick a minor ailment topic, or \"Random (select from list)\" for a surprise challenge.
2. The patient presents a brief case overview (name, age and reason for visit).
3. You are the pharmacist. Introduce yourself and ask the patient questions.
4. The patient gives details only when you ask for them.
5. The patient may close the consultation when it reaches a natural end, or you can type 'quit' at any time.
   You then receive concise, actionable feedback on your performance.
6. Start a new case once you have read your feedback.";

const INPUT_PROMPT: &str = "Your turn (type 'quit' to end consultation):";

/// Exit status for a process ended by SIGINT.
const INTERRUPTED_EXIT_CODE: i32 = 130;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Interrupt {
    /// A feedback request was waiting and has been cancelled.
    CancelledFeedback,
    /// Nothing cancellable was running. The program should exit.
    Exit,
}

/// Routes Ctrl+C for the whole session. While feedback is generating the
/// interrupt cancels it; at any other time it ends the program.
#[derive(Clone, Default)]
pub struct Interrupts {
    feedback: Arc<Mutex<Option<CancellationToken>>>,
}

impl Interrupts {
    /// Returns the token the next interrupt will cancel.
    pub fn arm(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        if let Ok(mut feedback) = self.feedback.lock() {
            *feedback = Some(cancel.clone());
        }

        return cancel;
    }

    pub fn disarm(&self) {
        if let Ok(mut feedback) = self.feedback.lock() {
            *feedback = None;
        }
    }

    pub fn interrupt(&self) -> Interrupt {
        let armed = match self.feedback.lock() {
            Ok(mut feedback) => feedback.take(),
            Err(_) => None,
        };

        match armed {
            Some(cancel) => {
                cancel.cancel();
                return Interrupt::CancelledFeedback;
            }
            None => return Interrupt::Exit,
        }
    }

    fn handle(&self) {
        if self.interrupt() == Interrupt::Exit {
            println!();
            process::exit(INTERRUPTED_EXIT_CODE);
        }
    }

    /// Installs the process-wide SIGINT listener. It lives until the runtime
    /// shuts down, so Ctrl+C keeps working after every feedback run.
    #[cfg(unix)]
    pub fn watch(&self) -> Result<JoinHandle<()>> {
        use tokio::signal::unix::signal;
        use tokio::signal::unix::SignalKind;

        let mut sigint = signal(SignalKind::interrupt())?;
        let interrupts = self.clone();

        return Ok(tokio::spawn(async move {
            while sigint.recv().await.is_some() {
                interrupts.handle();
            }
        }));
    }

    #[cfg(not(unix))]
    pub fn watch(&self) -> Result<JoinHandle<()>> {
        let interrupts = self.clone();

        return Ok(tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                interrupts.handle();
            }
        }));
    }
}

enum DialogueEnd {
    Concluded,
    Discarded,
    Eof,
}

pub fn format_event(event: &Event) -> String {
    match event {
        Event::Warning(text) => return text.to_string(),
        Event::Retrying {
            attempt,
            max_retries,
            delay,
            error,
        } => {
            return format!(
                "Model busy/overloaded. Retrying in {:.2} seconds (attempt {attempt} of {max_retries})... Error: {error}",
                delay.as_secs_f64()
            );
        }
    }
}

pub fn format_conclusion(ended_by: EndReason) -> &'static str {
    match ended_by {
        EndReason::User => {
            return "--- Pharmacist (You) ended the consultation. Generating feedback... ---"
        }
        EndReason::Patient => {
            return "--- Consultation concluded by patient. Generating feedback... ---"
        }
    }
}

fn print_event(event: &Event) {
    println!("{}", Paint::yellow(format_event(event)));
}

fn print_patient(text: &str) {
    println!("\n{} {}\n", Paint::cyan("Patient:").bold(), text.trim());
}

fn print_error(text: &str) {
    eprintln!("{}", Paint::red(text));
}

/// Awaits `fut`, printing every event raised while it runs.
async fn with_events<F, T>(fut: F, rx: &mut mpsc::UnboundedReceiver<Event>) -> T
where
    F: Future<Output = T>,
{
    tokio::pin!(fut);

    loop {
        tokio::select! {
            biased;
            Some(event) = rx.recv() => print_event(&event),
            res = &mut fut => {
                while let Ok(event) = rx.try_recv() {
                    print_event(&event);
                }
                return res;
            }
        }
    }
}

fn confirm(prompt: &str) -> Result<bool> {
    let res = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(prompt)
        .default(true)
        .interact()?;

    return Ok(res);
}

fn choose_topic() -> Result<ScenarioTopic> {
    let configured = Config::get(ConfigKey::Topic);
    if !configured.is_empty() {
        return ScenarioTopic::parse(&configured);
    }

    let topics = ScenarioTopic::all();
    let labels = topics
        .iter()
        .map(|topic| return topic.label())
        .collect::<Vec<&str>>();

    let idx = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Choose a Scenario Topic")
        .default(0)
        .items(&labels)
        .interact_opt()?;

    match idx {
        Some(idx) => return Ok(topics[idx]),
        None => bail!("No scenario topic selected"),
    }
}

/// Returns false when the user gave up on the scenario.
async fn open_consultation(
    consultation: &mut Consultation,
    rx: &mut mpsc::UnboundedReceiver<Event>,
) -> Result<bool> {
    consultation.start(choose_topic()?)?;

    loop {
        println!(
            "\n{}",
            Paint::blue("Patient (Generating scenario... Please wait)")
        );

        match with_events(consultation.generate_scenario(), rx).await {
            Ok(opening) => {
                print_patient(&opening);
                return Ok(true);
            }
            Err(err) => {
                print_error(&format!("Failed to generate initial scenario: {err:#}"));
                if !confirm("Try generating the scenario again?")? {
                    consultation.reset();
                    return Ok(false);
                }
            }
        }
    }
}

async fn run_dialogue(
    consultation: &mut Consultation,
    lines: &mut Lines<BufReader<Stdin>>,
    rx: &mut mpsc::UnboundedReceiver<Event>,
) -> Result<DialogueEnd> {
    loop {
        print!("{} ", Paint::new(INPUT_PROMPT).bold());
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => return Ok(DialogueEnd::Eof),
        };

        match with_events(consultation.submit(&line), rx).await {
            Ok(TurnOutcome::EmptyInput) => {
                println!(
                    "{}",
                    Paint::yellow(format!(
                        "Please type something to continue the consultation, or '{QUIT_COMMAND}' to end it."
                    ))
                );
            }
            Ok(TurnOutcome::Discarded) => {
                println!(
                    "{}",
                    Paint::yellow("Consultation ended early without significant interaction. No feedback generated.")
                );
                return Ok(DialogueEnd::Discarded);
            }
            Ok(TurnOutcome::Reply(reply)) => {
                print_patient(&reply);
            }
            Ok(TurnOutcome::Concluded { reply, ended_by }) => {
                if let Some(reply) = reply {
                    print_patient(&reply);
                }
                println!("{}", Paint::green(format_conclusion(ended_by)));
                return Ok(DialogueEnd::Concluded);
            }
            Err(err) => {
                print_error(&format!("Error generating patient response: {err:#}"));
            }
        }
    }
}

async fn run_feedback(
    consultation: &mut Consultation,
    rx: &mut mpsc::UnboundedReceiver<Event>,
    interrupts: &Interrupts,
) -> Result<()> {
    println!(
        "\n{}\n",
        Paint::new("Feedback on your Consultation").underline().bold()
    );

    loop {
        let cancel = interrupts.arm();
        let res = with_events(consultation.generate_feedback(&cancel), rx).await;
        interrupts.disarm();

        match res {
            Ok(report) => {
                if let Some(text) = report.text {
                    println!("{}\n", text.trim());
                }
                return Ok(());
            }
            Err(err) => {
                print_error(&format!("Error generating feedback: {err:#}"));
                if !confirm("Retry generating feedback?")? {
                    return Ok(());
                }
            }
        }
    }
}

pub async fn start(
    mut consultation: Consultation,
    mut rx: mpsc::UnboundedReceiver<Event>,
) -> Result<()> {
    println!("{}\n", Paint::yellow(DISCLAIMER));
    println!("{DESCRIPTION}\n");

    let interrupts = Interrupts::default();
    let _watcher = interrupts.watch()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        if open_consultation(&mut consultation, &mut rx).await? {
            match run_dialogue(&mut consultation, &mut lines, &mut rx).await? {
                DialogueEnd::Eof => return Ok(()),
                DialogueEnd::Discarded => {}
                DialogueEnd::Concluded => {
                    run_feedback(&mut consultation, &mut rx, &interrupts).await?
                }
            }
        }

        consultation.reset();
        if !confirm("Start a new consultation?")? {
            return Ok(());
        }
    }
}
