use {
    crossterm::{
        QueueableCommand, cursor,
        style::{Color, ResetColor, SetForegroundColor},
        terminal,
    },
    once_cell::sync::Lazy,
    parking_lot::{Mutex, RawMutex, lock_api::ArcMutexGuard},
    std::{
        fmt::{Display, Write as _},
        io::{self, Stdout, Write},
        process,
        sync::Arc,
        time::Duration,
    },
    tokio::{select, signal::ctrl_c, sync::oneshot, task, time::interval},
    tracing::{Level, Subscriber, error, field::Visit, warn},
    tracing_subscriber::Layer,
};

const STATUS_UPDATE_INTERVAL: Duration = Duration::from_millis(500);

struct Term {
    stdout: Stdout,
    current_status: Option<String>,
}

fn term() -> ArcMutexGuard<RawMutex, Term> {
    static TERM: Lazy<Arc<Mutex<Term>>> = Lazy::new(|| Arc::new(Mutex::new(Term::new())));
    Mutex::lock_arc(&TERM)
}

// Logging from here would recurse into `TermLayer`.
fn report(result: io::Result<()>) {
    if let Err(err) = result {
        eprintln!("failed to write to terminal: {err}");
    }
}

#[must_use]
pub struct StatusGuard;

impl StatusGuard {
    #[inline]
    pub fn set(&self, status: impl Display) {
        let mut term = term();
        let result = term.set_status(status);
        report(result);
    }
}

impl Drop for StatusGuard {
    #[inline]
    fn drop(&mut self) {
        clear_status();
    }
}

#[inline]
pub fn set_status(status: impl Display) -> StatusGuard {
    let guard = StatusGuard;
    guard.set(status);
    guard
}

#[inline]
pub fn clear_status() {
    let mut term = term();
    let result = term.clear_status();
    report(result);
}

pub struct StatusUpdaterGuard(Option<oneshot::Sender<()>>);

impl Drop for StatusUpdaterGuard {
    #[inline]
    fn drop(&mut self) {
        if let Some(sender) = self.0.take() {
            let _ = sender.send(());
        }
    }
}

/// Refreshes the status line with the output of `updater` until the guard is dropped.
#[inline]
pub fn set_status_updater(
    mut updater: impl FnMut() -> String + Send + 'static,
) -> StatusUpdaterGuard {
    let (sender, mut receiver) = oneshot::channel();

    task::spawn(async move {
        let mut interval = interval(STATUS_UPDATE_INTERVAL);
        let status = set_status(updater());
        loop {
            select! {
                _ = interval.tick() => {
                    status.set(updater());
                }
                _ = &mut receiver => break,
            }
        }
    });

    StatusUpdaterGuard(Some(sender))
}

impl Term {
    fn new() -> Self {
        task::spawn(async {
            match ctrl_c().await {
                Ok(()) => {
                    clear_status();
                    error!("Interrupted.");
                    process::exit(1);
                }
                Err(err) => {
                    warn!(?err, "failed to listen to interrupt signal");
                }
            }
        });
        Self {
            stdout: io::stdout(),
            current_status: None,
        }
    }

    fn set_status(&mut self, status: impl Display) -> io::Result<()> {
        let status = status.to_string();
        if self.current_status.is_none() {
            self.stdout.queue(cursor::Hide)?;
            self.stdout.queue(terminal::DisableLineWrap)?;
        } else {
            self.stdout.queue(cursor::RestorePosition)?;
            self.stdout
                .queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        }
        self.stdout.queue(cursor::SavePosition)?;
        self.stdout.queue(SetForegroundColor(Color::DarkGreen))?;
        self.stdout.write_all(status.as_bytes())?;
        self.stdout.queue(ResetColor)?;
        self.stdout.queue(cursor::RestorePosition)?;
        self.stdout.flush()?;
        self.current_status = Some(status);
        Ok(())
    }

    fn clear_status(&mut self) -> io::Result<()> {
        if self.current_status.is_none() {
            return Ok(());
        }
        self.current_status = None;

        self.stdout.queue(cursor::RestorePosition)?;
        self.stdout
            .queue(terminal::Clear(terminal::ClearType::FromCursorDown))?;
        self.stdout.queue(terminal::EnableLineWrap)?;
        self.stdout.queue(cursor::Show)?;
        self.stdout.flush()
    }

    fn write(&mut self, color: Option<Color>, text: &str) -> io::Result<()> {
        let old_status = self.current_status.clone();
        self.clear_status()?;
        if let Some(color) = color {
            self.stdout.queue(SetForegroundColor(color))?;
        }
        self.stdout.write_all(text.as_bytes())?;
        if !text.ends_with('\n') {
            self.stdout.write_all(b"\n")?;
        }
        if color.is_some() {
            self.stdout.queue(ResetColor)?;
        }
        if let Some(old_status) = old_status {
            self.set_status(old_status)?;
        }
        self.stdout.flush()
    }
}

/// Prints events of this application to the terminal above the status line.
pub struct TermLayer;

impl<S: Subscriber> Layer<S> for TermLayer {
    #[inline]
    fn on_event(
        &self,
        event: &tracing::Event<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) {
        let mut message = String::new();
        let mut fields = Vec::new();
        event.record(&mut DebugVisitor(&mut message, &mut fields));
        if !fields.is_empty() {
            let _ = write!(message, " ({})", fields.join(", "));
        }
        let level = *event.metadata().level();
        let color = if level == Level::ERROR || level == Level::WARN {
            Some(Color::Red)
        } else if level == Level::INFO {
            None
        } else {
            Some(Color::Grey)
        };
        let mut term = term();
        let result = term.write(color, &message);
        report(result);
    }

    #[inline]
    fn enabled(
        &self,
        metadata: &tracing::Metadata<'_>,
        _ctx: tracing_subscriber::layer::Context<'_, S>,
    ) -> bool {
        metadata
            .module_path()
            .is_some_and(|path| path.starts_with("chunkcrypt"))
    }
}

struct DebugVisitor<'a>(&'a mut String, &'a mut Vec<String>);

impl Visit for DebugVisitor<'_> {
    fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
        if field.name() == "message" {
            let _ = write!(self.0, "{value:?}");
        } else {
            self.1.push(format!("{} = {:?}", field.name(), value));
        }
    }
}
