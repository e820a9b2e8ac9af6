//! Raw RLP item access over `alloy_rlp::Header`

use alloy_rlp::Header;

/// One RLP item borrowed from its encoding
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RlpItem<'a> {
    pub is_list: bool,
    /// Payload without the header
    pub payload: &'a [u8],
    /// Full encoding including the header
    pub raw: &'a [u8],
}

/// Decode the next item and advance `buf` past it
pub fn next_item<'a>(buf: &mut &'a [u8]) -> Result<RlpItem<'a>, alloy_rlp::Error> {
    let start: &'a [u8] = buf;
    let header = Header::decode(buf)?;
    if buf.len() < header.payload_length {
        return Err(alloy_rlp::Error::InputTooShort);
    }
    let rest: &'a [u8] = buf;
    let payload = &rest[..header.payload_length];
    *buf = &rest[header.payload_length..];
    let raw = &start[..start.len() - buf.len()];
    Ok(RlpItem {
        is_list: header.list,
        payload,
        raw,
    })
}

/// Split an encoded list into its items; the list must span all of `data`
pub fn list_items(data: &[u8]) -> Result<Vec<RlpItem<'_>>, alloy_rlp::Error> {
    let mut buf = data;
    let outer = next_item(&mut buf)?;
    if !buf.is_empty() {
        return Err(alloy_rlp::Error::UnexpectedLength);
    }
    if !outer.is_list {
        return Err(alloy_rlp::Error::UnexpectedString);
    }
    let mut payload = outer.payload;
    let mut items = Vec::new();
    while !payload.is_empty() {
        items.push(next_item(&mut payload)?);
    }
    Ok(items)
}
