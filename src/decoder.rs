use crate::handler::{Diagnostics, NoteOnHandler};
use crate::message::{ByteKind, DecodedMessage, MessageKind};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DecoderState {
    Idle,
    ReceivingData,
}

#[derive(Debug, Default)]
struct PendingMessage {
    status: u8,
    channel: u8,
    data: [u8; 2],
    cursor: usize,
}

// any status byte resyncs onto a new message, even mid message
pub struct MidiDecoder<H, D> {
    state: DecoderState,
    pending: PendingMessage,
    handler: H,
    diagnostics: D,
}

impl<H: NoteOnHandler, D: Diagnostics> MidiDecoder<H, D> {
    pub fn new(handler: H, diagnostics: D) -> Self {
        Self {
            state: DecoderState::Idle,
            pending: PendingMessage::default(),
            handler,
            diagnostics,
        }
    }

    pub fn process_byte(&mut self, byte: u8) {
        match (self.state, ByteKind::of(byte)) {
            (DecoderState::Idle, ByteKind::Status) => self.process_status_byte(byte),
            (DecoderState::Idle, ByteKind::Data) => {
                tracing::trace!("midi_decoder: dropped data byte 0x{:02x}", byte);
            }
            (DecoderState::ReceivingData, ByteKind::Status) => {
                tracing::debug!(
                    "midi_decoder: status 0x{:02x} interrupted message with {} of 2 data bytes",
                    byte,
                    self.pending.cursor
                );
                self.pending.cursor = 0;
                self.process_status_byte(byte);
            }
            (DecoderState::ReceivingData, ByteKind::Data) => self.process_data_byte(byte),
        }
    }

    #[cfg(test)]
    pub fn process_bytes(&mut self, bytes: &[u8]) {
        for &b in bytes {
            self.process_byte(b);
        }
    }

    fn process_status_byte(&mut self, byte: u8) {
        self.pending.status = byte >> 4;
        self.pending.channel = byte & 0x0f;
        self.state = DecoderState::ReceivingData;
    }

    fn process_data_byte(&mut self, byte: u8) {
        self.pending.data[self.pending.cursor] = byte;

        if self.pending.cursor == 1 {
            self.handle_message();
            self.pending.cursor = 0;
            self.state = DecoderState::Idle;
        } else {
            self.pending.cursor += 1;
        }
    }

    fn handle_message(&mut self) {
        let msg = DecodedMessage {
            status: self.pending.status,
            channel: self.pending.channel,
            data: self.pending.data,
        };

        match msg.kind() {
            MessageKind::NoteOn => self.handler.note_on(msg.channel, msg.data[0], msg.data[1]),
            MessageKind::Ignored(status) => {
                tracing::trace!("midi_decoder: no handler for status 0x{:x}", status);
            }
        }

        self.diagnostics
            .report(msg.status, msg.channel, msg.data[0], msg.data[1]);
    }

    pub fn state(&self) -> DecoderState {
        self.state
    }

    pub fn cursor(&self) -> usize {
        self.pending.cursor
    }

    pub fn handler(&self) -> &H {
        &self.handler
    }

    pub fn diagnostics(&self) -> &D {
        &self.diagnostics
    }

    pub fn into_parts(self) -> (H, D) {
        (self.handler, self.diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handler::Recorder;

    #[derive(Default)]
    struct Notes(Vec<(u8, u8, u8)>);

    impl NoteOnHandler for Notes {
        fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
            self.0.push((channel, note, velocity));
        }
    }

    fn decoder() -> MidiDecoder<Notes, Recorder> {
        MidiDecoder::new(Notes::default(), Recorder::default())
    }

    fn assert_invariant<H: NoteOnHandler, D: Diagnostics>(decoder: &MidiDecoder<H, D>) {
        match decoder.state() {
            DecoderState::Idle => assert_eq!(decoder.cursor(), 0),
            DecoderState::ReceivingData => assert!(decoder.cursor() <= 1),
        }
    }

    #[test]
    fn note_on() {
        let mut d = decoder();
        d.process_bytes(&[0x90, 0x3c, 0x40]);

        assert_eq!(d.handler().0, vec![(0, 0x3c, 0x40)]);
        assert_eq!(d.diagnostics().reports, vec![[0x9, 0, 0x3c, 0x40]]);
        assert_eq!(d.state(), DecoderState::Idle);
        assert_eq!(d.cursor(), 0);
    }

    #[test]
    fn note_on_channel_from_low_nibble() {
        let mut d = decoder();
        d.process_bytes(&[0x9f, 0x24, 0x7f]);
        assert_eq!(d.handler().0, vec![(15, 0x24, 0x7f)]);
    }

    #[test]
    fn data_byte_while_idle_is_dropped() {
        let mut d = decoder();
        d.process_byte(0x3c);

        assert!(d.handler().0.is_empty());
        assert!(d.diagnostics().reports.is_empty());
        assert_eq!(d.state(), DecoderState::Idle);
        assert_eq!(d.cursor(), 0);
    }

    #[test]
    fn note_off_is_reported_not_dispatched() {
        let mut d = decoder();
        d.process_bytes(&[0x80, 0x3c, 0x40]);

        assert!(d.handler().0.is_empty());
        assert_eq!(d.diagnostics().reports, vec![[0x8, 0, 0x3c, 0x40]]);
        assert_eq!(d.state(), DecoderState::Idle);
    }

    #[test]
    fn status_mid_message_restarts() {
        let mut d = decoder();
        d.process_bytes(&[0x90, 0x3c]);
        assert_eq!(d.cursor(), 1);

        d.process_byte(0x91);
        assert_eq!(d.state(), DecoderState::ReceivingData);
        assert_eq!(d.cursor(), 0);
        assert!(d.diagnostics().reports.is_empty());

        d.process_bytes(&[0x40, 0x50]);
        assert_eq!(d.handler().0, vec![(1, 0x40, 0x50)]);
        assert_eq!(d.diagnostics().reports, vec![[0x9, 1, 0x40, 0x50]]);
    }

    #[test]
    fn status_before_any_data_replaces_status() {
        let mut d = decoder();
        d.process_bytes(&[0x90, 0x85, 0x3c, 0x00]);

        assert!(d.handler().0.is_empty());
        assert_eq!(d.diagnostics().reports, vec![[0x8, 5, 0x3c, 0x00]]);
    }

    #[test]
    fn realtime_byte_interrupts_message() {
        let mut d = decoder();
        d.process_bytes(&[0x90, 0x3c, 0xf8, 0x40]);

        assert!(d.handler().0.is_empty());
        assert!(d.diagnostics().reports.is_empty());
        assert_eq!(d.state(), DecoderState::ReceivingData);
        assert_eq!(d.cursor(), 1);

        d.process_byte(0x00);
        assert!(d.handler().0.is_empty());
        assert_eq!(d.diagnostics().reports, vec![[0xf, 8, 0x40, 0x00]]);
        assert_eq!(d.state(), DecoderState::Idle);
    }

    #[test]
    fn repeated_message_dispatches_twice() {
        let mut d = decoder();
        d.process_bytes(&[0x90, 0x3c, 0x40, 0x90, 0x3c, 0x40]);

        assert_eq!(d.handler().0, vec![(0, 0x3c, 0x40), (0, 0x3c, 0x40)]);
        assert_eq!(
            d.diagnostics().reports,
            vec![[0x9, 0, 0x3c, 0x40], [0x9, 0, 0x3c, 0x40]]
        );
    }

    #[test]
    fn running_status_data_is_dropped() {
        let mut d = decoder();
        d.process_bytes(&[0x90, 0x3c, 0x40, 0x3e, 0x40]);

        assert_eq!(d.handler().0.len(), 1);
        assert_eq!(d.state(), DecoderState::Idle);
    }

    #[test]
    fn two_byte_message_resyncs_on_next_status() {
        // two-byte messages aren't framed, so the next status byte resyncs
        let mut d = decoder();
        d.process_bytes(&[0xc0, 0x05, 0x90, 0x3c, 0x40]);

        assert_eq!(d.handler().0, vec![(0, 0x3c, 0x40)]);
        assert_eq!(d.diagnostics().reports, vec![[0x9, 0, 0x3c, 0x40]]);
    }

    #[test]
    fn no_handler_or_diagnostics() {
        let mut d = MidiDecoder::new((), ());
        d.process_bytes(&[0x90, 0x3c, 0x40]);
        assert_eq!(d.state(), DecoderState::Idle);
    }

    #[test]
    fn independent_decoders() {
        let mut a = decoder();
        let mut b = decoder();
        a.process_bytes(&[0x90, 0x3c]);
        b.process_bytes(&[0x40]);
        a.process_byte(0x40);

        assert_eq!(a.handler().0, vec![(0, 0x3c, 0x40)]);
        assert!(b.handler().0.is_empty());
    }

    #[test]
    fn invariant_holds_for_every_byte() {
        let prefixes: &[&[u8]] = &[&[], &[0x90], &[0x90, 0x3c], &[0x90, 0x3c, 0x40], &[0x3c]];

        for prefix in prefixes {
            for byte in 0..=u8::MAX {
                let mut d = decoder();
                for &b in prefix.iter() {
                    d.process_byte(b);
                    assert_invariant(&d);
                }
                d.process_byte(byte);
                assert_invariant(&d);
            }
        }
    }

    #[test]
    fn invariant_holds_for_noisy_stream() {
        let mut d = decoder();
        let mut x: u32 = 0x1234_5678;
        for _ in 0..10_000 {
            x ^= x << 13;
            x ^= x >> 17;
            x ^= x << 5;
            d.process_byte(x as u8);
            assert_invariant(&d);
        }

        let (notes, diagnostics) = d.into_parts();
        assert!(notes.0.len() <= diagnostics.reports.len());
        for &(channel, note, velocity) in &notes.0 {
            assert!(channel <= 0x0f);
            assert!(note < 0x80 && velocity < 0x80);
        }
    }
}
