//! μ-law↔PCM16 decoding and WAV framing.
//!
//! The telephony media socket only ever speaks G.711 μ-law at 8 kHz; this
//! module turns that into PCM16 and back into the WAV byte streams we hand
//! to the transcription client and the object-store uploader.

use crate::types::AudioChunk;

/// Standard ITU-T G.711 μ-law decode table, indexed by the raw byte.
fn mu_law_table() -> [i16; 256] {
    let mut table = [0i16; 256];
    for (i, entry) in table.iter_mut().enumerate() {
        let u = !(i as u8);
        let sign = if u & 0x80 != 0 { -1i32 } else { 1 };
        let exponent = ((u >> 4) & 0x07) as i32;
        let mantissa = (u & 0x0F) as i32;
        let magnitude = ((mantissa << 3) + 0x84) << exponent;
        *entry = (sign * (magnitude - 0x84)) as i16;
    }
    table
}

/// Decode a buffer of μ-law bytes into PCM16 samples.
pub fn mu_law_to_pcm16(bytes: &[u8]) -> Vec<i16> {
    let table = mu_law_table();
    bytes.iter().map(|&b| table[b as usize]).collect()
}

const WAV_HEADER_LEN: usize = 44;

fn write_wav_header(out: &mut Vec<u8>, channels: u16, sample_rate: u32, data_len: u32) {
    let byte_rate = sample_rate * channels as u32 * 2;
    let block_align = channels * 2;
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(36 + data_len).to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&16u32.to_le_bytes());
    out.extend_from_slice(&1u16.to_le_bytes()); // PCM
    out.extend_from_slice(&channels.to_le_bytes());
    out.extend_from_slice(&sample_rate.to_le_bytes());
    out.extend_from_slice(&byte_rate.to_le_bytes());
    out.extend_from_slice(&block_align.to_le_bytes());
    out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len.to_le_bytes());
}

/// Wrap mono PCM16 samples in a 44-byte RIFF/WAVE header.
pub fn mono_wav(pcm: &[i16], rate: u32) -> Vec<u8> {
    let data_len = (pcm.len() * 2) as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    write_wav_header(&mut out, 1, rate, data_len);
    for sample in pcm {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Interleave two PCM16 channels (left, right) into a stereo WAV, padding
/// the shorter channel with silence to match the longer one.
pub fn stereo_wav(left: &[i16], right: &[i16], rate: u32) -> Vec<u8> {
    let len = left.len().max(right.len());
    let data_len = (len * 2 * 2) as u32;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len as usize);
    write_wav_header(&mut out, 2, rate, data_len);
    for i in 0..len {
        let l = left.get(i).copied().unwrap_or(0);
        let r = right.get(i).copied().unwrap_or(0);
        out.extend_from_slice(&l.to_le_bytes());
        out.extend_from_slice(&r.to_le_bytes());
    }
    out
}

/// Align two timestamped μ-law chunk sequences onto a common PCM timeline.
///
/// Returns `(leftPcm, rightPcm)` where the lead occupies the left channel and
/// the SDR occupies the right channel (invariant (d) in the data model).
/// Handles the multi-second gap between SDR pickup and lead answer by laying
/// both tracks out against a shared `globalStart`/`globalEnd` window rather
/// than concatenating them independently.
pub fn synchronize_tracks(inbound: &[AudioChunk], outbound: &[AudioChunk], rate: u32) -> (Vec<i16>, Vec<i16>) {
    if inbound.is_empty() && outbound.is_empty() {
        return (Vec::new(), Vec::new());
    }

    let first_ts = |c: &[AudioChunk]| c.first().map(|c| c.timestamp_ms);
    let last_ts = |c: &[AudioChunk]| c.last().map(|c| c.timestamp_ms);

    let global_start = [first_ts(inbound), first_ts(outbound)].into_iter().flatten().min().unwrap_or(0);
    let global_end = [last_ts(inbound), last_ts(outbound)].into_iter().flatten().max().unwrap_or(0) + 20;

    let total_ms = global_end.saturating_sub(global_start);
    let total_samples = (total_ms * rate as u64).div_ceil(1000);
    let mut left = vec![0i16; total_samples as usize];
    let mut right = vec![0i16; total_samples as usize];

    // inbound = the SDR's own mic audio → right channel; outbound = whatever
    // Twilio plays back on this leg (the BIANCA announcement, then the
    // dialed lead's mixed-in audio) → left channel.
    copy_track(inbound, global_start, rate, &mut right);
    copy_track(outbound, global_start, rate, &mut left);

    (left, right)
}

fn copy_track(chunks: &[AudioChunk], global_start: u64, rate: u32, buf: &mut [i16]) {
    for chunk in chunks {
        let offset_ms = chunk.timestamp_ms.saturating_sub(global_start);
        let sample_offset = (offset_ms * rate as u64 / 1000) as usize;
        let samples = mu_law_to_pcm16(&chunk.payload);
        for (i, s) in samples.into_iter().enumerate() {
            let idx = sample_offset + i;
            if idx < buf.len() {
                buf[idx] = s;
            } else {
                break;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mu_law_silence_decodes_near_zero() {
        // 0xFF is the canonical μ-law encoding of positive zero.
        let samples = mu_law_to_pcm16(&[0xFF]);
        assert_eq!(samples.len(), 1);
        assert!(samples[0].abs() < 10);
    }

    #[test]
    fn mono_wav_header_round_trips_with_hound() {
        let pcm = vec![100i16, -100, 200, -200];
        let bytes = mono_wav(&pcm, 8000);
        let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.spec().sample_rate, 8000);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, pcm);
    }

    #[test]
    fn stereo_wav_pads_shorter_channel_with_silence() {
        let left = vec![1i16, 2, 3];
        let right = vec![9i16];
        let bytes = stereo_wav(&left, &right, 8000);
        let mut reader = hound::WavReader::new(std::io::Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().channels, 2);
        let samples: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(samples, vec![1, 9, 2, 0, 3, 0]);
    }

    #[test]
    fn synchronize_tracks_handles_multi_second_sdr_delay() {
        let inbound = vec![AudioChunk { timestamp_ms: 6000, payload: vec![0x00; 160] }];
        let outbound = vec![AudioChunk { timestamp_ms: 0, payload: vec![0xFF; 160] }];
        let (left, right) = synchronize_tracks(&inbound, &outbound, 8000);
        assert_eq!(left.len(), right.len());
        // SDR (inbound → right channel) stays silent for the first 6s (48000 samples).
        assert!(right[..48000].iter().all(|&s| s == 0));
        assert!(right[48000..].iter().any(|&s| s != 0) || right.len() == 48000);
    }

    #[test]
    fn synchronize_tracks_empty_inbound_track_is_pure_silence() {
        let outbound = vec![AudioChunk { timestamp_ms: 0, payload: vec![0x01; 160] }];
        let (left, right) = synchronize_tracks(&[], &outbound, 8000);
        // no inbound (SDR) chunks at all → the right channel stays silent.
        assert!(right.iter().all(|&s| s == 0));
        assert_eq!(right.len(), left.len());
    }
}
