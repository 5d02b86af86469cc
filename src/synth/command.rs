// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//

//! The ordered queue from the control side to the render side.

use crossbeam_channel::{Receiver, Sender, TrySendError};
use tracing::{error, warn};

use crate::error::ResourceExhaustion;

use super::channel::ChannelMix;
use super::params::VoiceParams;

/// A voice to start, fully resolved so the render side does no lookups.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteStart {
    /// Shared by every layer of one note-on.
    pub note_id: u64,
    pub channel: usize,
    pub key: u8,
    pub sample: usize,
    pub params: VoiceParams,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SynthCommand {
    StartVoice(NoteStart),
    NoteOff { channel: usize, key: u8 },
    /// A channel's mix changed.
    Channel { channel: usize, mix: ChannelMix },
    /// Replace every channel mix with the staged snapshot.
    SwapChannels,
    /// Release held voices, on one channel or all.
    ReleaseAll { channel: Option<usize> },
    /// Fade out voices quickly, on one channel or all.
    KillAll { channel: Option<usize> },
}

impl SynthCommand {
    /// Commands that end or reconcile sound. These may use the queue's reserve,
    /// since losing one would leave a note hanging.
    pub fn is_release(&self) -> bool {
        matches!(
            self,
            SynthCommand::NoteOff { .. }
                | SynthCommand::ReleaseAll { .. }
                | SynthCommand::KillAll { .. }
                | SynthCommand::SwapChannels
        )
    }
}

/// Creates a bounded command queue. Note starts and mix changes are accepted up to
/// `capacity` queued commands. Releases get the same again as a reserve.
pub fn queue(capacity: usize) -> (CommandSender, Receiver<SynthCommand>) {
    let capacity = capacity.max(1);
    let (sender, receiver) = crossbeam_channel::bounded(capacity * 2);
    (CommandSender { sender, capacity }, receiver)
}

/// The sending half. Sending never blocks; a full queue drops the command.
#[derive(Clone)]
pub struct CommandSender {
    sender: Sender<SynthCommand>,
    capacity: usize,
}

impl CommandSender {
    pub fn send(&self, command: SynthCommand) -> Result<(), ResourceExhaustion> {
        let err = ResourceExhaustion::CommandQueue {
            capacity: self.capacity,
        };
        if !command.is_release() && self.sender.len() >= self.capacity {
            warn!(err = %err, command = ?command, "Dropping synthesizer command");
            return Err(err);
        }
        match self.sender.try_send(command) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(command)) => {
                error!(err = %err, command = ?command, "Dropping release, notes may hang");
                Err(err)
            }
            // The synthesizer is gone, so nobody is listening.
            Err(TrySendError::Disconnected(_)) => Ok(()),
        }
    }

    pub fn len(&self) -> usize {
        self.sender.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sender.is_empty()
    }
}

/// Channel mixes staged by the control side for an atomic swap on the render side.
/// Buffers are handed back and forth so the render side never allocates.
#[derive(Debug, Default)]
pub struct ChannelSnapshot {
    pending: Option<Vec<ChannelMix>>,
    spare: Option<Vec<ChannelMix>>,
}

impl ChannelSnapshot {
    /// Stages a complete set of channel mixes, replacing any that are still pending.
    pub fn stage(&mut self, mixes: impl Iterator<Item = ChannelMix>) {
        let mut buffer = self
            .pending
            .take()
            .or_else(|| self.spare.take())
            .unwrap_or_default();
        buffer.clear();
        buffer.extend(mixes);
        self.pending = Some(buffer);
    }

    /// Swaps the pending mixes into `current`. Returns false if nothing was pending.
    pub fn apply(&mut self, current: &mut Vec<ChannelMix>) -> bool {
        match self.pending.take() {
            Some(pending) => {
                self.spare = Some(std::mem::replace(current, pending));
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for CommandSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSender")
            .field("capacity", &self.capacity)
            .field("queued", &self.sender.len())
            .finish()
    }
}
