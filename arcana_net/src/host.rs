use std::time::{Duration, Instant};

use anyhow::Result;
use arcana_core::{
    action::{Action, Seat},
    config::SessionConfig,
    message::{AceContext, Envelope},
    session::{deliver, Dispatch, HostSession, Recipient, ReplicationChannel},
};
use log::info;
use rand::{rngs::StdRng, SeedableRng};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    time,
};

use crate::{
    console::{self, Command},
    transport::{LinkEvent, ServerLink},
};

struct Host {
    session: HostSession<StdRng>,
    link: ServerLink,
    offer: Option<AceContext>,
}

impl Host {
    /// Sends what the guest needs (if one is connected) and shows the rest.
    fn route(&mut self, dispatches: Vec<Dispatch>) -> Result<()> {
        let local = if self.link.is_connected() {
            deliver(&mut self.link, dispatches)?
        } else {
            dispatches
                .into_iter()
                .filter(|d| d.recipient == Recipient::Local)
                .collect()
        };
        for dispatch in local {
            match dispatch.message {
                Envelope::Apply { events, .. } => {
                    self.offer = None;
                    console::print_events(&events);
                    println!("{}", console::render(self.session.state(), Seat::P1));
                }
                Envelope::AceOffer { context } => {
                    println!("{}", console::ace_prompt(&context));
                    self.offer = Some(context);
                }
                other => info!("ignoring local {} dispatch", other.kind()),
            }
        }
        Ok(())
    }

    /// Returns false once the user asked to quit.
    fn on_line(&mut self, line: &str) -> Result<bool> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(_) => {
                println!("Unknown command.{}", console::help());
                return Ok(true);
            }
        };
        let action = match command {
            Command::Quit => return Ok(false),
            Command::Help => {
                println!("{}", console::help());
                return Ok(true);
            }
            Command::Rules => {
                println!("{}", console::rules());
                return Ok(true);
            }
            Command::Show => {
                println!("{}", console::render(self.session.state(), Seat::P1));
                return Ok(true);
            }
            Command::Sync => {
                let dispatches = self.session.resync();
                self.route(dispatches)?;
                return Ok(true);
            }
            Command::Ace(used) => Action::AceReact {
                used,
                challenge: self.offer.take().and_then(|context| context.challenge),
            },
            Command::Play(action) => action,
        };
        match self.session.submit_local(action, Instant::now()) {
            Ok(dispatches) if dispatches.is_empty() => {
                if let Some(pending) = self.session.resolver().pending() {
                    println!("{}", console::queued_notice(pending, Seat::P1));
                }
            }
            Ok(dispatches) => self.route(dispatches)?,
            Err(error) => println!("{}", error),
        }
        Ok(true)
    }

    fn tick(&mut self) -> Result<()> {
        for event in self.link.update()? {
            match event {
                LinkEvent::GuestJoined => {
                    println!("Your opponent joined. Type [start] to deal.");
                    let dispatches = self.session.on_connected();
                    self.route(dispatches)?;
                }
                LinkEvent::GuestLeft => println!("Your opponent left."),
            }
        }
        let dispatches = if self.link.is_connected() {
            self.session.pump(&mut self.link, Instant::now())?
        } else {
            self.session.expire(Instant::now())
        };
        self.route(dispatches)?;
        self.link.flush();
        Ok(())
    }
}

pub async fn run(port: u16, config: SessionConfig) -> Result<()> {
    let mut host = Host {
        session: HostSession::new(StdRng::from_entropy(), config),
        link: ServerLink::bind(port)?,
        offer: None,
    };
    println!("Hosting on port {}. Waiting for an opponent...", port);

    let mut lines = BufReader::new(stdin()).lines();
    let mut interval = time::interval(Duration::from_millis(50));
    loop {
        host.tick()?;
        tokio::select! {
            _ = interval.tick() => {}
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !host.on_line(&line)? {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    Ok(())
}
