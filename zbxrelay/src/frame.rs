/**
 * FRAME CODEC - Enveloppe binaire du protocole Zabbix
 *
 * RÔLE : Encode/décode les trames `ZBXD\x01 | longueur(8 octets LE) | JSON`.
 * Même format côté agents et côté collecteur.
 *
 * FORMAT :
 * - 5 octets d'en-tête fixe
 * - 8 octets de longueur little-endian, seuls les 32 bits bas comptent
 * - `longueur` octets de payload UTF-8 JSON
 *
 * Toute lecture courte est une erreur : la connexion est abandonnée,
 * on ne parse jamais un buffer tronqué.
 */

use tokio::io::{AsyncRead, AsyncReadExt};

/// En-tête fixe de toutes les trames
pub const ZBX_HEADER: &[u8; 5] = b"ZBXD\x01";

pub const HEADER_LEN: usize = 5;
pub const LENGTH_LEN: usize = 8;

/// Taille max acceptée pour un payload entrant (128 MiB)
pub const MAX_PAYLOAD_LEN: usize = 128 * 1024 * 1024;

#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    #[error("invalid header: {0:02x?}")]
    InvalidHeader([u8; HEADER_LEN]),
    #[error("truncated frame while reading {stage}: {source}")]
    Truncated {
        stage: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("frame payload too large: {size} bytes (max {max})")]
    TooLarge { size: usize, max: usize },
}

/// Préfixe le payload avec l'en-tête et la longueur sur 8 octets
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + LENGTH_LEN + payload.len());
    out.extend_from_slice(ZBX_HEADER);
    let mut len = [0u8; LENGTH_LEN];
    len[..4].copy_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(&len);
    out.extend_from_slice(payload);
    out
}

/// Longueur portée par le champ de 8 octets (32 bits bas uniquement)
pub fn payload_len(field: &[u8; LENGTH_LEN]) -> usize {
    u32::from_le_bytes([field[0], field[1], field[2], field[3]]) as usize
}

/// Lit une trame complète et retourne son payload
pub async fn decode_frame<R>(reader: &mut R) -> Result<Vec<u8>, FrameError>
where
    R: AsyncRead + Unpin,
{
    let mut header = [0u8; HEADER_LEN];
    reader
        .read_exact(&mut header)
        .await
        .map_err(|source| FrameError::Truncated { stage: "header", source })?;
    if &header != ZBX_HEADER {
        return Err(FrameError::InvalidHeader(header));
    }

    let mut len_field = [0u8; LENGTH_LEN];
    reader
        .read_exact(&mut len_field)
        .await
        .map_err(|source| FrameError::Truncated { stage: "length", source })?;
    let size = payload_len(&len_field);
    if size > MAX_PAYLOAD_LEN {
        return Err(FrameError::TooLarge { size, max: MAX_PAYLOAD_LEN });
    }

    let mut payload = vec![0u8; size];
    reader
        .read_exact(&mut payload)
        .await
        .map_err(|source| FrameError::Truncated { stage: "payload", source })?;
    Ok(payload)
}
