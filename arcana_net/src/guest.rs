use std::{net::SocketAddr, time::Duration};

use anyhow::{bail, Result};
use arcana_core::{
    action::{Action, Seat},
    construct::evaluate,
    message::Envelope,
    session::{GuestMirror, GuestUpdate, ReplicationChannel},
};
use tokio::{
    io::{stdin, AsyncBufReadExt, BufReader},
    time,
};

use crate::{
    console::{self, Command},
    transport::ClientLink,
};

struct Guest {
    mirror: GuestMirror,
    link: ClientLink,
}

impl Guest {
    fn send(&mut self, envelope: Envelope) -> Result<()> {
        self.link.send(envelope.encode()?)?;
        Ok(())
    }

    /// Catches obviously invalid constructs before bothering the host.
    fn preflight(&self, action: &Action) -> Option<String> {
        let Action::Construct { ids, .. } = action else {
            return None;
        };
        let hand = self.mirror.state().player(Seat::P2);
        let cards: Option<Vec<_>> = ids.iter().map(|&id| hand.card(id).copied()).collect();
        match cards {
            None => Some("You do not hold all of those cards.".to_string()),
            Some(cards) => evaluate(&cards).err().map(|e| e.to_string()),
        }
    }

    fn on_line(&mut self, line: &str) -> Result<bool> {
        let command = match line.parse::<Command>() {
            Ok(command) => command,
            Err(_) => {
                println!("Unknown command.{}", console::help());
                return Ok(true);
            }
        };
        match command {
            Command::Quit => return Ok(false),
            Command::Help => println!("{}", console::help()),
            Command::Rules => println!("{}", console::rules()),
            Command::Show | Command::Sync => {
                println!("{}", console::render(self.mirror.state(), Seat::P2))
            }
            Command::Ace(used) => {
                let answer = self.mirror.answer_ace(used);
                self.send(answer)?;
            }
            Command::Play(Action::Start) => println!("Only the host can deal a new game."),
            Command::Play(action) => match self.preflight(&action) {
                Some(problem) => println!("{}", problem),
                None => {
                    let request = self.mirror.request(action);
                    self.send(request)?;
                }
            },
        }
        Ok(true)
    }

    fn tick(&mut self) -> Result<()> {
        self.link.update()?;
        while let Some(text) = self.link.try_recv() {
            match self.mirror.on_text(&text) {
                GuestUpdate::Hydrated(events) => {
                    console::print_events(&events);
                    println!("{}", console::render(self.mirror.state(), Seat::P2));
                }
                GuestUpdate::AceOffer(context) => println!("{}", console::ace_prompt(&context)),
                GuestUpdate::Ignored => {}
            }
        }
        self.link.flush()
    }
}

pub async fn run(addr: SocketAddr) -> Result<()> {
    let mut guest = Guest {
        mirror: GuestMirror::new(),
        link: ClientLink::connect(addr)?,
    };
    println!("Joining {}...", addr);

    let mut lines = BufReader::new(stdin()).lines();
    let mut interval = time::interval(Duration::from_millis(50));
    let mut joined = false;
    loop {
        guest.tick()?;
        if guest.link.is_connected() && !joined {
            joined = true;
            println!("Connected as P2. Type [help] for commands.");
        }
        if guest.link.is_disconnected() {
            if joined {
                println!("The host closed the session.");
                return Ok(());
            }
            bail!("could not connect to {}", addr);
        }
        tokio::select! {
            _ = interval.tick() => {}
            line = lines.next_line() => match line? {
                Some(line) => {
                    if !guest.on_line(&line)? {
                        break;
                    }
                }
                None => break,
            },
        }
    }
    Ok(())
}
