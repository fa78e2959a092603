use std::time::Duration;

use color_eyre::eyre::Result;
use futures::stream::StreamExt;
use ratatui::{Terminal, prelude::Backend};
use tokio::{
    sync::mpsc::{self, error::TryRecvError},
    time::{Instant, sleep, timeout_at},
};
use tracing::{debug, trace};

use crate::{
    application::Application,
    command::{Action, Command},
    subscription::SubscriptionManager,
};

/// Drives an [`Application`]: owns the model, runs commands and subscriptions, and
/// redraws the terminal.
///
/// Every action produced by a command or subscription goes through one channel and is
/// applied in arrival order, so `update` never runs concurrently with itself.
pub struct Runtime<A: Application> {
    app: A,
    tx: mpsc::UnboundedSender<Action<A::Message>>,
    rx: mpsc::UnboundedReceiver<Action<A::Message>>,
    subscriptions: SubscriptionManager<A::Message>,
    frame_duration: Duration,
    quit: bool,
}

impl<A: Application> Runtime<A> {
    /// Builds the application, starts its startup command and mounts its subscriptions.
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(flags: A::Flags, frame_rate: u32) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (app, cmd) = A::new(flags);
        let subscriptions = SubscriptionManager::new(tx.clone());

        let mut runtime = Self {
            app,
            tx,
            rx,
            subscriptions,
            frame_duration: Duration::from_millis(1000 / u64::from(frame_rate.max(1))),
            quit: false,
        };
        runtime.spawn(cmd);
        runtime.subscriptions.update(runtime.app.subscriptions());
        runtime
    }

    /// The current model.
    pub const fn app(&self) -> &A {
        &self.app
    }

    /// Returns `true` once a command asked the runtime to stop.
    pub const fn should_quit(&self) -> bool {
        self.quit
    }

    /// Applies `msg` as if it had come from a command or subscription.
    pub fn dispatch(&mut self, msg: A::Message) {
        let cmd = self.app.update(msg);
        self.spawn(cmd);
        self.subscriptions.update(self.app.subscriptions());
    }

    /// Processes actions without a terminal until `done` holds for the model.
    ///
    /// Returns `false` if `limit` elapsed or the application quit first.
    pub async fn run_until(&mut self, done: impl Fn(&A) -> bool, limit: Duration) -> bool {
        let deadline = Instant::now() + limit;
        while !done(&self.app) {
            if self.quit {
                return false;
            }
            match timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(action)) => self.process(action),
                Ok(None) | Err(_) => return false,
            }
        }
        true
    }

    /// Runs the event loop until the application quits, then cancels every subscription.
    pub async fn run<B: Backend>(mut self, terminal: &mut Terminal<B>) -> Result<()> {
        let result = self.event_loop(terminal).await;
        debug!(subscriptions = self.subscriptions.len(), "shutting down");
        self.subscriptions.shutdown();
        result
    }

    async fn event_loop<B: Backend>(&mut self, terminal: &mut Terminal<B>) -> Result<()> {
        while !self.quit {
            terminal.draw(|frame| self.app.view(frame))?;

            tokio::select! {
                action = self.rx.recv() => match action {
                    Some(action) => self.process(action),
                    None => break,
                },
                () = sleep(self.frame_duration) => {}
            }

            // Apply everything that is already queued before the next frame.
            while !self.quit {
                match self.rx.try_recv() {
                    Ok(action) => self.process(action),
                    Err(TryRecvError::Empty | TryRecvError::Disconnected) => break,
                }
            }
        }
        Ok(())
    }

    fn process(&mut self, action: Action<A::Message>) {
        match action {
            Action::Message(msg) => self.dispatch(msg),
            Action::Quit => {
                trace!("quit requested");
                self.quit = true;
            }
        }
    }

    fn spawn(&self, cmd: Command<A::Message>) {
        let Some(mut stream) = cmd.stream else {
            return;
        };
        let tx = self.tx.clone();
        tokio::spawn(async move {
            while let Some(action) = stream.next().await {
                if tx.send(action).is_err() {
                    break;
                }
            }
        });
    }
}
