pub trait NoteOnHandler {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8);
}

// called from inside process_byte, must not block
pub trait Diagnostics {
    fn report(&mut self, status: u8, channel: u8, data0: u8, data1: u8);
}

impl<F: FnMut(u8, u8, u8)> NoteOnHandler for F {
    fn note_on(&mut self, channel: u8, note: u8, velocity: u8) {
        self(channel, note, velocity)
    }
}

impl NoteOnHandler for () {
    fn note_on(&mut self, _channel: u8, _note: u8, _velocity: u8) {}
}

impl Diagnostics for () {
    fn report(&mut self, _status: u8, _channel: u8, _data0: u8, _data1: u8) {}
}

impl<D: Diagnostics> Diagnostics for Option<D> {
    fn report(&mut self, status: u8, channel: u8, data0: u8, data1: u8) {
        if let Some(diagnostics) = self.as_mut() {
            diagnostics.report(status, channel, data0, data1);
        }
    }
}

impl<A: Diagnostics, B: Diagnostics> Diagnostics for (A, B) {
    fn report(&mut self, status: u8, channel: u8, data0: u8, data1: u8) {
        self.0.report(status, channel, data0, data1);
        self.1.report(status, channel, data0, data1);
    }
}

#[cfg(test)]
#[derive(Default)]
pub struct Recorder {
    pub reports: Vec<[u8; 4]>,
}

#[cfg(test)]
impl Diagnostics for Recorder {
    fn report(&mut self, status: u8, channel: u8, data0: u8, data1: u8) {
        self.reports.push([status, channel, data0, data1]);
    }
}

#[test]
fn closure_handles_note_on() {
    let mut notes = Vec::new();
    let mut handler = |c: u8, n: u8, v: u8| notes.push((c, n, v));
    handler.note_on(2, 60, 100);
    assert_eq!(notes, vec![(2, 60, 100)]);
}

#[test]
fn optional_diagnostics() {
    let mut off: Option<Recorder> = None;
    off.report(0x9, 0, 1, 2);

    let mut on = Some(Recorder::default());
    on.report(0x9, 0, 1, 2);
    assert_eq!(on.unwrap().reports, vec![[0x9, 0, 1, 2]]);
}

#[test]
fn paired_diagnostics_fan_out() {
    let mut pair = (Recorder::default(), Recorder::default());
    pair.report(0x8, 5, 0x3c, 0x00);
    assert_eq!(pair.0.reports, vec![[0x8, 5, 0x3c, 0x00]]);
    assert_eq!(pair.1.reports, pair.0.reports);
}
