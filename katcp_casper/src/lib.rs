use base64::{engine::general_purpose::STANDARD, Engine};
use katcp::prelude::*;
use katcp_derive::{KatcpDiscrete, KatcpMessage};

#[derive(KatcpMessage, Debug, PartialEq, Eq, Clone)]
/// Request information about the available named registers
pub enum Listdev {
    Request,
    Inform { register: String },
    Reply { ret_code: RetCode },
}

#[derive(KatcpDiscrete, Debug, PartialEq, Eq, Clone)]
pub enum FpgaStatus {
    Loaded,
    Ready,
    Down,
    Mapped,
}

#[derive(KatcpMessage, Debug, PartialEq, Eq, Clone)]
/// Infrom messages we get from certain FPGA commands
pub enum Fpga {
    Inform { status: FpgaStatus },
}

#[derive(KatcpMessage, Debug, PartialEq, Eq, Clone)]
/// Requests the FPGA's status, replies ok only when a design is programmed
pub enum Fpgastatus {
    Request,
    Reply { ret_code: RetCode },
}

#[derive(KatcpMessage, Debug, PartialEq, Eq, Clone)]
/// Reads the 32-bit word at word `offset` of register `name`
pub enum Wordread {
    Request { name: String, offset: u32 },
    Reply { ret_code: RetCode, word: HexWord },
}

#[derive(KatcpMessage, Debug, PartialEq, Eq, Clone)]
/// Writes a 32-bit word at word `offset` of register `name`
pub enum Wordwrite {
    Request {
        name: String,
        offset: u32,
        word: HexWord,
    },
    Reply {
        ret_code: RetCode,
    },
}

#[derive(KatcpMessage, Debug, PartialEq, Eq, Clone)]
/// Bulk read of `num_bytes` bytes of register `name`, starting `offset` bytes in
pub enum Read {
    Request {
        name: String,
        offset: u32,
        num_bytes: u32,
    },
    Reply {
        ret_code: RetCode,
        bytes: Base64Bytes,
    },
}

/// Binary payloads travel base64 encoded so replies stay printable
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Base64Bytes(pub Vec<u8>);

impl ToKatcpArgument for Base64Bytes {
    fn to_argument(&self) -> String {
        STANDARD.encode(&self.0)
    }
}

impl FromKatcpArgument for Base64Bytes {
    type Err = KatcpError;

    fn from_argument(s: impl AsRef<str>) -> Result<Self, Self::Err> {
        Ok(Base64Bytes(
            STANDARD
                .decode(s.as_ref())
                .map_err(|_| KatcpError::BadArgument)?,
        ))
    }
}

// We need explicit serde for hex literals
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct HexWord(pub u32);

impl ToKatcpArgument for HexWord {
    fn to_argument(&self) -> String {
        format!("0x{}", hex::encode(self.0.to_be_bytes()))
    }
}

impl FromKatcpArgument for HexWord {
    type Err = KatcpError;

    fn from_argument(s: impl AsRef<str>) -> Result<Self, Self::Err> {
        let digits = s.as_ref().strip_prefix("0x").ok_or(KatcpError::BadArgument)?;
        Ok(HexWord(u32::from_be_bytes(
            hex::decode(digits)
                .map_err(|_| KatcpError::BadArgument)?
                .try_into()
                .map_err(|_| KatcpError::BadArgument)?,
        )))
    }
}
