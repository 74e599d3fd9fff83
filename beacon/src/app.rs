//! Single-threaded event loop.
//!
//! All navigator state lives on the loop thread. Background jobs run on their
//! own threads and report back through a channel; messages are handled
//! strictly in arrival order. Interactive jobs suspend the surface and block
//! the loop until they finish.

use std::collections::VecDeque;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{debug, info, instrument};

use crate::executor::{Job, Services};
use crate::io::registry::{PreferenceStore, Registry};
use crate::navigator::{Effect, Msg, Navigator, View};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Rendering surface and input source.
pub trait Surface {
    /// `busy` is set while background jobs are in flight.
    fn draw(&mut self, view: View<'_>, busy: bool) -> Result<()>;

    /// Wait up to `timeout` for input, already mapped to a message.
    fn poll(&mut self, timeout: Duration) -> Result<Option<Msg>>;

    /// Hand the terminal to a child process.
    fn suspend(&mut self) -> Result<()>;

    fn resume(&mut self) -> Result<()>;
}

pub struct App<R, S> {
    navigator: Navigator<R>,
    surface: S,
    services: Services,
    tx: Sender<Msg>,
    rx: Receiver<Msg>,
    in_flight: usize,
}

enum Control {
    Continue,
    Quit,
}

impl<R: Registry + PreferenceStore, S: Surface> App<R, S> {
    pub fn new(navigator: Navigator<R>, surface: S, services: Services) -> Self {
        let (tx, rx) = mpsc::channel();
        Self {
            navigator,
            surface,
            services,
            tx,
            rx,
            in_flight: 0,
        }
    }

    pub fn navigator(&self) -> &Navigator<R> {
        &self.navigator
    }

    /// Run until a quit effect, dispatching `initial` messages first.
    #[instrument(skip_all)]
    pub fn run(&mut self, initial: Vec<Msg>) -> Result<()> {
        info!("session started");
        for msg in initial {
            if let Control::Quit = self.handle(msg)? {
                return Ok(());
            }
        }
        loop {
            self.surface
                .draw(self.navigator.view(), self.in_flight > 0)
                .context("draw")?;

            loop {
                match self.rx.try_recv() {
                    Ok(msg) => {
                        self.in_flight = self.in_flight.saturating_sub(1);
                        if let Control::Quit = self.handle(msg)? {
                            info!("session finished");
                            return Ok(());
                        }
                    }
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }

            if let Some(msg) = self.surface.poll(POLL_INTERVAL).context("poll input")?
                && let Control::Quit = self.handle(msg)?
            {
                info!("session finished");
                return Ok(());
            }
        }
    }

    /// Dispatch `msg` and everything it produces synchronously.
    fn handle(&mut self, msg: Msg) -> Result<Control> {
        let mut pending = VecDeque::from([msg]);
        while let Some(msg) = pending.pop_front() {
            for effect in self.navigator.dispatch(msg) {
                match effect {
                    Effect::Background(job) => self.spawn(job),
                    Effect::Suspend(job) => pending.push_back(self.suspend(job)?),
                    Effect::Quit => return Ok(Control::Quit),
                }
            }
        }
        Ok(Control::Continue)
    }

    fn spawn(&mut self, job: Job) {
        self.in_flight += 1;
        debug!(in_flight = self.in_flight, "spawning background job");
        let services = self.services.clone();
        let tx = self.tx.clone();
        thread::spawn(move || {
            let msg = job.run(&services);
            // The loop may already be gone on quit.
            let _ = tx.send(msg);
        });
    }

    fn suspend(&mut self, job: Job) -> Result<Msg> {
        self.surface.suspend().context("suspend terminal")?;
        let msg = job.run(&self.services);
        self.surface.resume().context("resume terminal")?;
        Ok(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::manifest::CommandMode;
    use crate::core::page::{Key, Page};
    use crate::io::history::History;
    use crate::navigator::Size;
    use crate::test_support::{
        MemoryRegistry, RecordingEffects, ScriptedInvoker, command, extension, root_item, services,
    };
    use std::sync::Arc;

    /// Surface replaying scripted input; quits once the script is exhausted.
    #[derive(Default)]
    struct ScriptedSurface {
        input: VecDeque<Msg>,
        draws: Vec<(Vec<String>, bool)>,
        suspends: usize,
        resumes: usize,
        idle_polls: usize,
    }

    impl Surface for ScriptedSurface {
        fn draw(&mut self, view: View<'_>, busy: bool) -> Result<()> {
            let titles = view
                .frames
                .iter()
                .map(|frame| frame.page.title().to_string())
                .collect();
            self.draws.push((titles, busy));
            Ok(())
        }

        fn poll(&mut self, timeout: Duration) -> Result<Option<Msg>> {
            if let Some(msg) = self.input.pop_front() {
                return Ok(Some(msg));
            }
            self.idle_polls += 1;
            if self.idle_polls > 40 {
                return Ok(Some(Msg::Exit));
            }
            thread::sleep(timeout / 10);
            Ok(None)
        }

        fn suspend(&mut self) -> Result<()> {
            self.suspends += 1;
            Ok(())
        }

        fn resume(&mut self) -> Result<()> {
            self.resumes += 1;
            Ok(())
        }
    }

    fn app(
        invoker: ScriptedInvoker,
        input: Vec<Msg>,
    ) -> (tempfile::TempDir, App<MemoryRegistry, ScriptedSurface>) {
        let temp = tempfile::tempdir().expect("tempdir");
        let mut ext = extension(
            "ext",
            vec![
                command("list", CommandMode::List, Vec::new()),
                command("shell", CommandMode::Tty, Vec::new()),
            ],
            Vec::new(),
        );
        ext.manifest.items = vec![root_item("List", "list"), root_item("Shell", "shell")];
        let navigator = Navigator::new(
            MemoryRegistry::new(vec![ext]),
            History::empty(temp.path().join("history.json")),
        );
        let surface = ScriptedSurface {
            input: input.into(),
            ..ScriptedSurface::default()
        };
        let app = App::new(
            navigator,
            surface,
            services(Arc::new(invoker), Arc::new(RecordingEffects::new())),
        );
        (temp, app)
    }

    #[test]
    fn background_result_is_pushed_on_a_later_iteration() {
        let invoker = ScriptedInvoker::new().respond("list", r#"{"title":"Listed","items":[]}"#);
        let (_temp, mut app) = app(invoker, vec![Msg::Key(Key::Enter)]);
        app.run(Vec::new()).expect("run");

        let frames = app.navigator().stack();
        assert_eq!(frames.len(), 2);
        assert!(matches!(&frames[1].page, Page::List(list) if list.title == "Listed"));
        assert!(app.surface.draws.iter().any(|(_, busy)| *busy));
    }

    #[test]
    fn interactive_command_suspends_and_resumes_surface() {
        let invoker = ScriptedInvoker::new().respond("shell", "");
        let (_temp, mut app) = app(invoker, vec![Msg::Key(Key::Down), Msg::Key(Key::Enter)]);
        app.run(vec![Msg::Resize(Size {
            width: 80,
            height: 24,
        })])
        .expect("run");

        assert_eq!(app.surface.suspends, 1);
        assert_eq!(app.surface.resumes, 1);
        assert_eq!(app.navigator().depth(), 1);
        assert_eq!(app.navigator().stack()[0].size.width, 80);
    }

    #[test]
    fn initial_exit_stops_before_drawing() {
        let (_temp, mut app) = app(ScriptedInvoker::new(), Vec::new());
        app.run(vec![Msg::Exit]).expect("run");
        assert!(app.surface.draws.is_empty());
    }
}
