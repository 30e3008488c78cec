//! Joining of RIFF/WAVE files synthesized in pieces.
//!
//! Speech providers cap the input length of one request, so long scripts are
//! synthesized chunk by chunk. MP3 frames and Ogg pages concatenate as-is;
//! WAV pieces each carry their own header, so their sample data is merged
//! under a single rewritten header instead.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WavError {
    #[error("part {part} is not a RIFF/WAVE file")]
    NotWave { part: usize },

    #[error("part {part} has no '{chunk}' chunk")]
    MissingChunk { part: usize, chunk: &'static str },

    #[error("part {part} uses a different sample format than part 1")]
    FormatMismatch { part: usize },

    #[error("merged audio exceeds the 4 GiB WAV limit")]
    TooLarge,
}

/// The `fmt ` and `data` payloads of one WAV file.
struct Parsed<'a> {
    fmt: &'a [u8],
    data: &'a [u8],
}

fn read_u32(bytes: &[u8], at: usize) -> Option<u32> {
    let raw = bytes.get(at..at + 4)?;
    Some(u32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
}

fn parse(bytes: &[u8], part: usize) -> Result<Parsed<'_>, WavError> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(WavError::NotWave { part });
    }

    let mut fmt = None;
    let mut offset = 12;
    while offset + 8 <= bytes.len() {
        let id = &bytes[offset..offset + 4];
        let declared = read_u32(bytes, offset + 4).unwrap_or(0) as usize;
        let start = offset + 8;
        // Streaming encoders leave sizes unset (0 or u32::MAX); take the rest.
        let end = match start.checked_add(declared) {
            Some(end) if declared > 0 && end <= bytes.len() => end,
            _ => bytes.len(),
        };

        match id {
            b"fmt " => fmt = Some(&bytes[start..end]),
            b"data" => {
                let fmt = fmt.ok_or(WavError::MissingChunk { part, chunk: "fmt " })?;
                return Ok(Parsed {
                    fmt,
                    data: &bytes[start..end],
                });
            }
            _ => {}
        }
        // Chunks are word aligned.
        offset = end + (end - start) % 2;
    }

    Err(WavError::MissingChunk { part, chunk: "data" })
}

/// Merge WAV files sharing one sample format into a single file.
///
/// A single part is returned unchanged.
pub fn merge(parts: &[Vec<u8>]) -> Result<Vec<u8>, WavError> {
    if let [only] = parts {
        return Ok(only.clone());
    }

    let parsed = parts
        .iter()
        .enumerate()
        .map(|(i, bytes)| parse(bytes, i + 1))
        .collect::<Result<Vec<_>, _>>()?;
    let Some(first) = parsed.first() else {
        return Ok(Vec::new());
    };
    if let Some(part) = parsed.iter().position(|p| p.fmt != first.fmt) {
        return Err(WavError::FormatMismatch { part: part + 1 });
    }

    let data_len: usize = parsed.iter().map(|p| p.data.len()).sum();
    let fmt_len = first.fmt.len();
    let fmt_pad = fmt_len % 2;
    let data_pad = data_len % 2;
    let riff_len = 4 + 8 + fmt_len + fmt_pad + 8 + data_len + data_pad;
    let riff_len = u32::try_from(riff_len).map_err(|_| WavError::TooLarge)?;
    let data_len_u32 = u32::try_from(data_len).map_err(|_| WavError::TooLarge)?;

    let mut out = Vec::with_capacity(riff_len as usize + 8);
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&riff_len.to_le_bytes());
    out.extend_from_slice(b"WAVE");
    out.extend_from_slice(b"fmt ");
    out.extend_from_slice(&(fmt_len as u32).to_le_bytes());
    out.extend_from_slice(first.fmt);
    if fmt_pad == 1 {
        out.push(0);
    }
    out.extend_from_slice(b"data");
    out.extend_from_slice(&data_len_u32.to_le_bytes());
    for p in &parsed {
        out.extend_from_slice(p.data);
    }
    if data_pad == 1 {
        out.push(0);
    }
    Ok(out)
}

/// Build a 16-bit mono PCM WAV file around `samples`.
#[cfg(test)]
pub(crate) fn pcm16(sample_rate: u32, samples: &[i16]) -> Vec<u8> {
    let data_len = (samples.len() * 2) as u32;
    let mut bytes = Vec::with_capacity(44 + data_len as usize);
    bytes.extend_from_slice(b"RIFF");
    bytes.extend_from_slice(&(36u32 + data_len).to_le_bytes());
    bytes.extend_from_slice(b"WAVE");
    bytes.extend_from_slice(b"fmt ");
    bytes.extend_from_slice(&16u32.to_le_bytes());
    bytes.extend_from_slice(&1u16.to_le_bytes()); // PCM
    bytes.extend_from_slice(&1u16.to_le_bytes()); // mono
    bytes.extend_from_slice(&sample_rate.to_le_bytes());
    bytes.extend_from_slice(&(sample_rate * 2).to_le_bytes());
    bytes.extend_from_slice(&2u16.to_le_bytes());
    bytes.extend_from_slice(&16u16.to_le_bytes());
    bytes.extend_from_slice(b"data");
    bytes.extend_from_slice(&data_len.to_le_bytes());
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}
