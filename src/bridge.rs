use crate::decoder::MidiDecoder;
use crate::handler::{Diagnostics, NoteOnHandler};
use crate::ring::create_byte_ring;
use crate::serial::SerialIn;

pub async fn run<H: NoteOnHandler, D: Diagnostics>(
    serial: &mut SerialIn,
    decoder: &mut MidiDecoder<H, D>,
    ring_size: usize,
) -> usize {
    let (mut tx, mut rx) = create_byte_ring(ring_size);

    let read_in = async {
        while serial.is_open() {
            if let Some(data) = serial.recv().await {
                tx.send_all(data).await;
            }
        }
        tx.close();
    };

    let decode = rx.recv_until_closed(|b| decoder.process_byte(b));

    let ((), count) = futures::join!(read_in, decode);
    count
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decoder::DecoderState;
    use crate::handler::Recorder;

    #[tokio::test]
    async fn decodes_whole_stream() {
        let line: &'static [u8] = &[
            0x3c, // noise before the first status byte
            0x90, 0x3c, 0x40, //
            0x80, 0x3c, 0x00, //
            0x99, 0x24, 0x7f, //
            0x90, 0x3e, // cut short by the next status byte
            0xb0, 0x07, 0x64,
        ];
        let mut serial = SerialIn::new(line);

        let mut notes = Vec::new();
        let mut decoder = MidiDecoder::new(
            |c: u8, n: u8, v: u8| notes.push((c, n, v)),
            Recorder::default(),
        );

        // small ring forces the reader to wait on the decoder
        let count = run(&mut serial, &mut decoder, 4).await;
        assert_eq!(count, line.len());
        assert_eq!(decoder.state(), DecoderState::Idle);

        let (_, diagnostics) = decoder.into_parts();
        assert_eq!(
            diagnostics.reports,
            vec![
                [0x9, 0, 0x3c, 0x40],
                [0x8, 0, 0x3c, 0x00],
                [0x9, 9, 0x24, 0x7f],
                [0xb, 0, 0x07, 0x64],
            ]
        );
        assert_eq!(notes, vec![(0, 0x3c, 0x40), (9, 0x24, 0x7f)]);
    }

    #[tokio::test]
    async fn empty_stream() {
        let line: &'static [u8] = &[];
        let mut serial = SerialIn::new(line);
        let mut decoder = MidiDecoder::new((), Recorder::default());

        assert_eq!(run(&mut serial, &mut decoder, 16).await, 0);
        assert!(decoder.diagnostics().reports.is_empty());
    }
}
