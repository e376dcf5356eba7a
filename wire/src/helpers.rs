// Copyright (c) 2022-2023 The MobileCoin Foundation

#![allow(unused)]

use crate::WireError;

/// encdec helper module for fixed byte arrays
pub(crate) mod arr {
    use crate::WireError;

    pub fn enc<const N: usize>(d: &[u8; N], buff: &mut [u8]) -> Result<usize, WireError> {
        if buff.len() < d.len() {
            return Err(WireError::InvalidLength);
        }

        buff[..d.len()].copy_from_slice(&d[..]);

        Ok(d.len())
    }

    pub fn enc_len<const N: usize>(d: &[u8; N]) -> Result<usize, WireError> {
        Ok(d.len())
    }

    pub fn dec<const N: usize>(buff: &[u8]) -> Result<([u8; N], usize), WireError> {
        if buff.len() < N {
            return Err(WireError::InvalidLength);
        }

        let mut d = [0u8; N];
        d.copy_from_slice(&buff[..N]);

        Ok((d, N))
    }
}

/// Validate a string field against its wire bound, returning the length byte
pub(crate) fn str_len(s: &str, max: usize) -> Result<u8, WireError> {
    let n = s.as_bytes().len();
    if n > max {
        return Err(WireError::InvalidLength);
    }
    Ok(n as u8)
}

/// Fetch a bounded UTF-8 string field from a buffer
pub(crate) fn take_str(buff: &[u8], offset: usize, len: usize, max: usize) -> Result<&str, WireError> {
    if len > max {
        return Err(WireError::InvalidLength);
    }
    if buff.len() < offset + len {
        return Err(WireError::InvalidLength);
    }

    core::str::from_utf8(&buff[offset..offset + len]).map_err(|_| WireError::InvalidUtf8)
}
