pub const NOTE_ON: u8 = 0x9;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ByteKind {
    Status,
    Data,
}

impl ByteKind {
    pub fn of(byte: u8) -> Self {
        if byte & 0x80 == 0 {
            ByteKind::Data
        } else {
            ByteKind::Status
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MessageKind {
    NoteOn,
    Ignored(u8),
}

impl MessageKind {
    pub fn from_status(status: u8) -> Self {
        match status {
            NOTE_ON => MessageKind::NoteOn,
            other => MessageKind::Ignored(other),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DecodedMessage {
    pub status: u8,
    pub channel: u8,
    pub data: [u8; 2],
}

impl DecodedMessage {
    pub fn kind(&self) -> MessageKind {
        MessageKind::from_status(self.status)
    }

    pub fn to_bytes(&self) -> [u8; 3] {
        [
            (self.status << 4) | (self.channel & 0x0f),
            self.data[0],
            self.data[1],
        ]
    }
}

#[test]
fn byte_kind_uses_high_bit() {
    assert_eq!(ByteKind::of(0x00), ByteKind::Data);
    assert_eq!(ByteKind::of(0x7f), ByteKind::Data);
    assert_eq!(ByteKind::of(0x80), ByteKind::Status);
    assert_eq!(ByteKind::of(0xff), ByteKind::Status);
}

#[test]
fn only_note_on_is_dispatched() {
    assert_eq!(MessageKind::from_status(0x9), MessageKind::NoteOn);
    for status in (0x8..=0xf).filter(|s| *s != 0x9) {
        assert_eq!(MessageKind::from_status(status), MessageKind::Ignored(status));
    }
}

#[test]
fn decoded_message_wire_bytes() {
    let msg = DecodedMessage {
        status: 0x9,
        channel: 0x3,
        data: [0x3c, 0x40],
    };
    assert_eq!(msg.kind(), MessageKind::NoteOn);
    assert_eq!(msg.to_bytes(), [0x93, 0x3c, 0x40]);
}
