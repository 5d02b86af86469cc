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

//! Polls a sequencer on a fixed interval from its own thread.

use std::{
    sync::{atomic::AtomicBool, Arc},
    thread::{self, JoinHandle},
    time::Duration,
};

use parking_lot::Mutex;
use thread_priority::{set_current_thread_priority, ThreadPriority};
use tracing::{debug, info};

use crate::playsync::CancelHandle;

use super::{PlaybackState, Sequencer};

/// Polls until playback stops or finishes. Cancelling the handle hard-stops the
/// sequencer. A sequencer that is not playing yet returns immediately.
pub fn run(sequencer: &Mutex<Sequencer>, interval: Duration, cancel: &CancelHandle) -> PlaybackState {
    loop {
        if cancel.is_cancelled() {
            let mut sequencer = sequencer.lock();
            sequencer.stop();
            info!("Sequencer cancelled");
            return sequencer.state();
        }

        let state = sequencer.lock().poll();
        match state {
            PlaybackState::Playing | PlaybackState::Paused => {}
            PlaybackState::Stopped | PlaybackState::Finished => return state,
        }
        spin_sleep::sleep(interval);
    }
}

/// Runs [`run`] on a low priority thread. `finished` is set when it returns and
/// anything waiting on `cancel` is woken.
pub fn spawn(
    sequencer: Arc<Mutex<Sequencer>>,
    interval: Duration,
    cancel: CancelHandle,
    finished: Arc<AtomicBool>,
) -> JoinHandle<PlaybackState> {
    thread::spawn(move || {
        if let Err(e) = set_current_thread_priority(ThreadPriority::Min) {
            debug!(err = ?e, "Unable to lower the sequencer thread priority");
        }
        let state = run(&sequencer, interval, &cancel);
        cancel.finish(&finished);
        state
    })
}
