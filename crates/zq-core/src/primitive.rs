//! Primitive kinds and their textual/binary encoding. Grounded on
//! `original_source/zng/value.go`'s `Parse`/`Marshal`/`StringOf` triad,
//! specialized per kind the way `zng`'s `TypeOf*` singletons do.

use crate::error::{Result, TypeError};
use crate::escape::{escape_bytes, escape_string, unescape_bytes, unescape_string, OutFmt};
use crate::zcode::Bytes;
use ipnetwork::IpNetwork;
use std::net::IpAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Primitive {
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    Uint8,
    Uint16,
    Uint32,
    Uint64,
    Float64,
    String,
    Bytes,
    Time,
    Duration,
    Ip,
    Net,
    Port,
    Null,
}

impl Primitive {
    pub fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "bool",
            Primitive::Int8 => "int8",
            Primitive::Int16 => "int16",
            Primitive::Int32 => "int32",
            Primitive::Int64 => "int64",
            Primitive::Uint8 => "uint8",
            Primitive::Uint16 => "uint16",
            Primitive::Uint32 => "uint32",
            Primitive::Uint64 => "uint64",
            Primitive::Float64 => "float64",
            Primitive::String => "string",
            Primitive::Bytes => "bytes",
            Primitive::Time => "time",
            Primitive::Duration => "duration",
            Primitive::Ip => "ip",
            Primitive::Net => "net",
            Primitive::Port => "port",
            Primitive::Null => "null",
        }
    }

    pub fn lookup(name: &str) -> Option<Primitive> {
        use Primitive::*;
        Some(match name {
            "bool" => Bool,
            "int8" => Int8,
            "int16" => Int16,
            "int32" => Int32,
            "int64" => Int64,
            "uint8" => Uint8,
            "uint16" => Uint16,
            "uint32" => Uint32,
            "uint64" => Uint64,
            "float64" => Float64,
            "string" => String,
            "bytes" => Bytes,
            "time" => Time,
            "duration" => Duration,
            "ip" => Ip,
            "net" => Net,
            "port" => Port,
            "null" => Null,
            _ => return None,
        })
    }

    pub fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::Int8
                | Primitive::Int16
                | Primitive::Int32
                | Primitive::Int64
                | Primitive::Uint8
                | Primitive::Uint16
                | Primitive::Uint32
                | Primitive::Uint64
        )
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::Int8 | Primitive::Int16 | Primitive::Int32 | Primitive::Int64
        )
    }

    /// Parse a textual literal into encoded bytes.
    pub fn parse(self, text: &str) -> Result<Bytes> {
        use Primitive::*;
        Ok(match self {
            Bool => vec![if text == "true" { 1 } else { 0 }],
            Int8 | Int16 | Int32 | Int64 => {
                let v: i64 = text
                    .parse()
                    .map_err(|_| TypeError::Syntax(format!("bad int literal {text:?}")))?;
                encode_int(v)
            }
            Uint8 | Uint16 | Uint32 | Uint64 => {
                let v: u64 = text
                    .parse()
                    .map_err(|_| TypeError::Syntax(format!("bad uint literal {text:?}")))?;
                encode_uint(v)
            }
            Float64 => {
                let v: f64 = text
                    .parse()
                    .map_err(|_| TypeError::Syntax(format!("bad float literal {text:?}")))?;
                v.to_le_bytes().to_vec()
            }
            String => unescape_string(text).into_bytes(),
            Bytes => unescape_bytes(text),
            Time => encode_int(parse_seconds(text)?),
            Duration => encode_int(parse_seconds(text)?),
            Ip => {
                let ip: IpAddr = text
                    .parse()
                    .map_err(|_| TypeError::Syntax(format!("bad ip literal {text:?}")))?;
                encode_ip(ip)
            }
            Net => {
                let net: IpNetwork = text
                    .parse()
                    .map_err(|_| TypeError::Syntax(format!("bad net literal {text:?}")))?;
                encode_net(net)
            }
            Port => {
                let v: u16 = text
                    .parse()
                    .map_err(|_| TypeError::Syntax(format!("bad port literal {text:?}")))?;
                v.to_le_bytes().to_vec()
            }
            Null => Vec::new(),
        })
    }

    pub fn marshal(self, bytes: &[u8]) -> Result<serde_json::Value> {
        use serde_json::Value as J;
        Ok(match self {
            Primitive::Bool => J::Bool(decode_bool(bytes)?),
            p if p.is_integer() => {
                if p.is_signed() {
                    J::from(decode_int(bytes)?)
                } else {
                    J::from(decode_uint(bytes)?)
                }
            }
            Primitive::Float64 => {
                serde_json::Number::from_f64(decode_f64(bytes)?)
                    .map(J::Number)
                    .unwrap_or(J::Null)
            }
            Primitive::String => J::String(decode_string(bytes)?),
            Primitive::Bytes => J::String(escape_bytes(bytes, OutFmt::Primary, false)),
            Primitive::Time | Primitive::Duration => J::from(decode_int(bytes)?),
            Primitive::Ip => J::String(decode_ip(bytes)?.to_string()),
            Primitive::Net => J::String(decode_net(bytes)?.to_string()),
            Primitive::Port => J::from(decode_port(bytes)?),
            Primitive::Null => J::Null,
        })
    }

    pub fn string_of(self, bytes: &[u8], fmt: OutFmt, in_container: bool) -> String {
        match self {
            Primitive::Bool => decode_bool(bytes).map(|b| b.to_string()).unwrap_or_default(),
            p if p.is_integer() => {
                if p.is_signed() {
                    decode_int(bytes).map(|v| v.to_string()).unwrap_or_default()
                } else {
                    decode_uint(bytes)
                        .map(|v| v.to_string())
                        .unwrap_or_default()
                }
            }
            Primitive::Float64 => decode_f64(bytes).map(|v| v.to_string()).unwrap_or_default(),
            Primitive::String => decode_string(bytes)
                .map(|s| escape_string(&s, fmt, in_container))
                .unwrap_or_default(),
            Primitive::Bytes => escape_bytes(bytes, fmt, in_container),
            Primitive::Time | Primitive::Duration => decode_int(bytes)
                .map(|ns| format!("{}.{:09}", ns / 1_000_000_000, (ns.rem_euclid(1_000_000_000))))
                .unwrap_or_default(),
            Primitive::Ip => decode_ip(bytes).map(|ip| ip.to_string()).unwrap_or_default(),
            Primitive::Net => decode_net(bytes)
                .map(|n| n.to_string())
                .unwrap_or_default(),
            Primitive::Port => decode_port(bytes).map(|p| p.to_string()).unwrap_or_default(),
            Primitive::Null => "-".to_string(),
        }
    }
}

fn parse_seconds(text: &str) -> Result<i64> {
    let v: f64 = text
        .parse()
        .map_err(|_| TypeError::Syntax(format!("bad time/duration literal {text:?}")))?;
    Ok((v * 1e9).round() as i64)
}

pub fn encode_int(v: i64) -> Bytes {
    v.to_le_bytes().to_vec()
}

pub fn decode_int(b: &[u8]) -> Result<i64> {
    let arr: [u8; 8] = b
        .try_into()
        .map_err(|_| TypeError::Other("bad int encoding".into()))?;
    Ok(i64::from_le_bytes(arr))
}

pub fn encode_uint(v: u64) -> Bytes {
    v.to_le_bytes().to_vec()
}

pub fn decode_uint(b: &[u8]) -> Result<u64> {
    let arr: [u8; 8] = b
        .try_into()
        .map_err(|_| TypeError::Other("bad uint encoding".into()))?;
    Ok(u64::from_le_bytes(arr))
}

pub fn decode_f64(b: &[u8]) -> Result<f64> {
    let arr: [u8; 8] = b
        .try_into()
        .map_err(|_| TypeError::Other("bad float encoding".into()))?;
    Ok(f64::from_le_bytes(arr))
}

pub fn decode_bool(b: &[u8]) -> Result<bool> {
    Ok(b.first().copied().unwrap_or(0) != 0)
}

pub fn decode_string(b: &[u8]) -> Result<String> {
    std::str::from_utf8(b)
        .map(|s| s.to_string())
        .map_err(|_| TypeError::Other("invalid utf8".into()))
}

pub fn encode_ip(ip: IpAddr) -> Bytes {
    match ip {
        IpAddr::V4(v4) => v4.octets().to_vec(),
        IpAddr::V6(v6) => v6.octets().to_vec(),
    }
}

pub fn decode_ip(b: &[u8]) -> Result<IpAddr> {
    match b.len() {
        4 => {
            let arr: [u8; 4] = b.try_into().unwrap();
            Ok(IpAddr::from(arr))
        }
        16 => {
            let arr: [u8; 16] = b.try_into().unwrap();
            Ok(IpAddr::from(arr))
        }
        _ => Err(TypeError::Other("bad ip encoding".into())),
    }
}

pub fn encode_net(net: IpNetwork) -> Bytes {
    let mut out = encode_ip(net.ip());
    out.push(net.prefix());
    out
}

pub fn decode_net(b: &[u8]) -> Result<IpNetwork> {
    if b.is_empty() {
        return Err(TypeError::Other("bad net encoding".into()));
    }
    let (ipbytes, prefix) = (&b[..b.len() - 1], b[b.len() - 1]);
    let ip = decode_ip(ipbytes)?;
    IpNetwork::new(ip, prefix).map_err(|_| TypeError::Other("bad net encoding".into()))
}

pub fn decode_port(b: &[u8]) -> Result<u16> {
    let arr: [u8; 2] = b
        .try_into()
        .map_err(|_| TypeError::Other("bad port encoding".into()))?;
    Ok(u16::from_le_bytes(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn int_roundtrip() {
        let b = Primitive::Int64.parse("-42").unwrap();
        assert_eq!(decode_int(&b).unwrap(), -42);
        assert_eq!(Primitive::Int64.string_of(&b, OutFmt::Primary, false), "-42");
    }

    #[test]
    fn ip_roundtrip() {
        let b = Primitive::Ip.parse("10.0.0.1").unwrap();
        assert_eq!(b.len(), 4);
        assert_eq!(Primitive::Ip.string_of(&b, OutFmt::Primary, false), "10.0.0.1");
    }

    #[test]
    fn net_roundtrip() {
        let b = Primitive::Net.parse("10.0.0.0/24").unwrap();
        assert_eq!(Primitive::Net.string_of(&b, OutFmt::Primary, false), "10.0.0.0/24");
    }

    #[test]
    fn time_formats_ns_as_seconds_fraction() {
        let b = Primitive::Time.parse("1.5").unwrap();
        assert_eq!(decode_int(&b).unwrap(), 1_500_000_000);
    }
}
