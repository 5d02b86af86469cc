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

//! End-to-end tests: files in, sequencer against the audio clock, audio out.

use std::{
    fs,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use serial_test::serial;

use crate::config::{self, OutputLayout, SynthConfig};
use crate::midi::ParsedMidi;
use crate::playsync::CancelHandle;
use crate::sequencer::{driver, PlaybackState, Sequencer};
use crate::soundfont::SoundFont;
use crate::synth::{self, EventListener, Synthesizer, VoiceState};
use crate::testutil::midi::{MidiBuilder, TrackBuilder};
use crate::testutil::soundfont::general_bank;
use crate::testutil::{calculate_rms, peak};
use crate::{load_midi, load_sound_font};

#[derive(Clone, Default)]
struct Programs {
    names: Arc<Mutex<Vec<String>>>,
}

impl EventListener for Programs {
    fn on_program_change(&mut self, channel: usize, _bank: u16, _program: u8, preset: &str) {
        self.names.lock().push(format!("{} {}", channel, preset));
    }
}

fn song() -> Vec<u8> {
    MidiBuilder::new(480)
        .track(
            TrackBuilder::new()
                .name(0, "Test Song")
                .tempo_bpm(0, 120.0)
                .tempo_bpm(960, 240.0),
        )
        .track(
            TrackBuilder::new()
                .program(0, 0, 1)
                .note_on(0, 0, 48, 100)
                .note_off(480, 0, 48)
                .note_on(480, 0, 72, 110)
                .note_off(960, 0, 72),
        )
        .track(
            TrackBuilder::new()
                .note_on(240, 9, 42, 100)
                .note_on(720, 9, 46, 100)
                .note_off(1440, 9, 46),
        )
        .build()
}

fn create(config: &SynthConfig, midi: &[u8]) -> (Sequencer, Synthesizer) {
    let font = Arc::new(load_sound_font(&general_bank()).unwrap());
    let (control, synthesizer) = synth::create(font, config).unwrap();
    let midi = load_midi(midi).unwrap();
    (
        Sequencer::new(control, synthesizer.clock().clone(), midi),
        synthesizer,
    )
}

fn sounding_keys(synthesizer: &Synthesizer, channel: usize) -> Vec<u8> {
    synthesizer
        .pool()
        .voices()
        .iter()
        .filter(|v| v.channel() == channel && v.state().is_sounding())
        .map(|v| v.key())
        .collect()
}

#[test]
fn test_load_from_files() {
    let dir = tempfile::tempdir().unwrap();
    let font_path = dir.path().join("bank.sf2");
    let midi_path = dir.path().join("song.mid");
    fs::write(&font_path, general_bank()).unwrap();
    fs::write(&midi_path, song()).unwrap();

    let font = SoundFont::from_file(&font_path).unwrap();
    assert_eq!(font.presets().len(), 3);
    let midi = ParsedMidi::from_file(&midi_path).unwrap();
    assert_eq!(midi.title(), Some("Test Song"));
    // 960 ticks at 120 BPM, then 480 at 240 BPM.
    assert!((midi.duration() - 1.25).abs() < 1e-9);

    assert!(matches!(
        ParsedMidi::from_file(&dir.path().join("missing.mid")),
        Err(crate::error::FormatError::Io(_))
    ));
}

#[test]
fn test_render_song() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("synth.yaml");
    fs::write(
        &path,
        "output: planar\nblock_size: 64\nkill_fade: 80ms\nmax_voices: 32\n",
    )
    .unwrap();
    let config = config::load(&path).unwrap();
    assert_eq!(config.output(), OutputLayout::Planar);

    let (mut sequencer, mut synthesizer) = create(&config, &song());
    let programs = Programs::default();
    sequencer
        .control_mut()
        .add_listener(Box::new(programs.clone()));

    sequencer.play(true);
    let mut loudest: f32 = 0.0;
    let mut peak_voices = 0;
    while sequencer.poll() == PlaybackState::Playing {
        let block = synthesizer.render(441);
        assert_eq!(block.len(), 882);
        loudest = loudest.max(peak(block));
        peak_voices = peak_voices.max(synthesizer.active_voices());
    }
    assert!(sequencer.is_finished());
    assert!(loudest > 0.01);
    assert!(peak_voices >= 2);
    assert_eq!(*programs.names.lock(), vec!["0 Pad".to_string()]);

    // Every voice has been released and fades out.
    let mut tail = 0;
    while synthesizer.active_voices() > 0 {
        synthesizer.render(441);
        tail += 1;
        assert!(tail < 200, "voices never finished");
    }
    assert_eq!(calculate_rms(synthesizer.render(441)), 0.0);
}

#[test]
fn test_hi_hat_choke() {
    let (mut sequencer, mut synthesizer) = create(&SynthConfig::default(), &song());
    sequencer.play(true);

    // The closed hat at 0.25s.
    while synthesizer.clock().seconds() < 0.4 {
        sequencer.poll();
        synthesizer.render(441);
    }
    assert_eq!(sounding_keys(&synthesizer, 9), vec![42]);

    // The open hat at 0.75s chokes it.
    while synthesizer.clock().seconds() < 0.8 {
        sequencer.poll();
        synthesizer.render(441);
    }
    assert_eq!(sounding_keys(&synthesizer, 9), vec![46]);
    assert!(synthesizer
        .pool()
        .voices()
        .iter()
        .filter(|v| v.key() == 42)
        .all(|v| matches!(v.state(), VoiceState::Killed | VoiceState::Finished)));
}

#[test]
fn test_seek_while_playing() {
    let (mut sequencer, mut synthesizer) = create(&SynthConfig::default(), &song());
    sequencer.play(true);
    while synthesizer.clock().seconds() < 0.1 {
        sequencer.poll();
        synthesizer.render(441);
    }
    assert_eq!(sounding_keys(&synthesizer, 0), vec![48]);

    // Past the first note off and the second note on. The second note is not
    // started by the seek.
    sequencer.seek(0.6);
    assert_eq!(sequencer.state(), PlaybackState::Playing);
    synthesizer.render(441);
    assert!(sounding_keys(&synthesizer, 0).is_empty());
    assert_eq!(sequencer.control().channel(0).unwrap().program(), 1);

    // The open hat is still ahead.
    while synthesizer.clock().seconds() < 0.4 {
        sequencer.poll();
        synthesizer.render(441);
    }
    assert_eq!(sounding_keys(&synthesizer, 9), vec![46]);
}

#[test]
fn test_live_input_alongside_playback() {
    let (mut sequencer, mut synthesizer) = create(&SynthConfig::default(), &song());
    sequencer.play(true);
    sequencer.poll();
    sequencer.control_mut().process_midi_event(&[0x92, 64, 90]);
    synthesizer.render(441);
    assert_eq!(sounding_keys(&synthesizer, 2), vec![64]);

    sequencer.control_mut().process_midi_event(&[0x82, 64, 0]);
    synthesizer.render(441);
    assert!(sounding_keys(&synthesizer, 2).is_empty());
}

#[test]
#[serial]
fn test_threaded_playback() {
    let config = SynthConfig::default();
    let (sequencer, mut synthesizer) = create(&config, &song());
    let sequencer = Arc::new(Mutex::new(sequencer));
    let finished = Arc::new(AtomicBool::new(false));

    let renderer = {
        let finished = finished.clone();
        std::thread::spawn(move || {
            let mut loudest: f32 = 0.0;
            while !finished.load(Ordering::Relaxed) {
                loudest = loudest.max(peak(synthesizer.render(256)));
            }
            loudest
        })
    };

    sequencer.lock().play(true);
    let cancel = CancelHandle::new();
    let join = driver::spawn(
        sequencer.clone(),
        config.poll_interval().unwrap(),
        cancel.clone(),
        finished.clone(),
    );
    cancel.wait(finished.clone());

    assert_eq!(join.join().unwrap(), PlaybackState::Finished);
    assert!(renderer.join().unwrap() > 0.01);
}
