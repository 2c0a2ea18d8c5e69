use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use super::{BufferRequirement, Converter};
use crate::{
    Result,
    error::DecodeError,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{PgFormat, ProtocolError},
    types::{Cidr, Inet},
};

const AF_INET: u8 = 2;
const AF_INET6: u8 = 3;

/// family, bits, is_cidr, address length
const HEADER_SIZE: usize = 4;

async fn read_addr<S: ReadSource>(reader: &mut PgReader<S>) -> Result<(IpAddr, u8)> {
    reader.ensure(HEADER_SIZE).await?;
    let family = reader.read_u8();
    let bits = reader.read_u8();
    // postgres accepts either kind regardless of this flag
    let _is_cidr = reader.read_u8();
    let len = reader.read_u8();

    let addr = match (family, len) {
        (AF_INET, 4) => {
            reader.ensure(4).await?;
            IpAddr::V4(Ipv4Addr::from(reader.read_u32()))
        }
        (AF_INET6, 16) => {
            reader.ensure(16).await?;
            let hi = reader.read_u64() as u128;
            let lo = reader.read_u64() as u128;
            IpAddr::V6(Ipv6Addr::from((hi << 64) | lo))
        }
        _ => {
            return Err(ProtocolError::malformed(format!(
                "inet family {family} with address length {len}"
            ))
            .into())
        }
    };

    Ok((addr, bits))
}

fn addr_size(addr: &IpAddr) -> usize {
    match addr {
        IpAddr::V4(_) => 4,
        IpAddr::V6(_) => 16,
    }
}

async fn write_addr<S: WriteSink>(
    writer: &mut PgWriter<S>,
    addr: &IpAddr,
    netmask: u8,
    is_cidr: bool,
) -> Result<()> {
    writer.ensure(HEADER_SIZE + addr_size(addr)).await?;
    match addr {
        IpAddr::V4(v4) => {
            writer.write_u8(AF_INET);
            writer.write_u8(netmask);
            writer.write_u8(is_cidr as u8);
            writer.write_u8(4);
            writer.write_slice(&v4.octets());
        }
        IpAddr::V6(v6) => {
            writer.write_u8(AF_INET6);
            writer.write_u8(netmask);
            writer.write_u8(is_cidr as u8);
            writer.write_u8(16);
            writer.write_slice(&v6.octets());
        }
    }
    Ok(())
}

fn can_convert(format: PgFormat) -> (bool, BufferRequirement) {
    (format == PgFormat::Binary, BufferRequirement::UpperBound(HEADER_SIZE + 16))
}

/// `inet`, host address with netmask.
#[derive(Debug, Clone, Copy, Default)]
pub struct InetConverter;

impl Converter for InetConverter {
    type Value = Inet;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        can_convert(format)
    }

    fn get_size(&self, value: &Inet) -> Result<usize> {
        Ok(HEADER_SIZE + addr_size(&value.addr()))
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Inet> {
        let (addr, bits) = read_addr(reader).await?;
        Inet::new(addr, bits).map_err(|e| DecodeError::Invalid(e.to_string().into()).into())
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Inet) -> Result<()> {
        write_addr(writer, &value.addr(), value.netmask(), false).await
    }
}

/// `cidr`, network address with netmask.
#[derive(Debug, Clone, Copy, Default)]
pub struct CidrConverter;

impl Converter for CidrConverter {
    type Value = Cidr;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        can_convert(format)
    }

    fn get_size(&self, value: &Cidr) -> Result<usize> {
        Ok(HEADER_SIZE + addr_size(&value.addr()))
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Cidr> {
        let (addr, bits) = read_addr(reader).await?;
        Cidr::new(addr, bits).map_err(|e| DecodeError::Invalid(e.to_string().into()).into())
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Cidr) -> Result<()> {
        write_addr(writer, &value.addr(), value.netmask(), true).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{convert::ConverterExt, error::ErrorKind};
    use bytes::Bytes;

    #[test]
    fn inet_v4() {
        let inet: Inet = "192.168.1.10/24".parse().unwrap();
        let bytes = InetConverter.encode(&inet).unwrap();
        assert_eq!(&bytes[..], &[2, 24, 0, 4, 192, 168, 1, 10]);
        assert_eq!(InetConverter.decode(bytes.freeze()).unwrap(), inet);
    }

    #[test]
    fn cidr_v6() {
        let cidr: Cidr = "2001:db8::/32".parse().unwrap();
        let bytes = CidrConverter.encode(&cidr).unwrap();
        assert_eq!(bytes.len(), 20);
        assert_eq!(&bytes[..4], &[3, 32, 1, 16]);
        assert_eq!(CidrConverter.decode(bytes.freeze()).unwrap(), cidr);
    }

    #[test]
    fn is_cidr_flag_ignored() {
        let bytes = Bytes::from_static(&[2, 8, 1, 4, 10, 0, 0, 0]);
        let inet = InetConverter.decode(bytes).unwrap();
        assert_eq!(inet.netmask(), 8);
    }

    #[test]
    fn invalid_header() {
        let err = InetConverter.decode(Bytes::from_static(&[2, 8, 0, 16])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));

        let err = InetConverter.decode(Bytes::from_static(&[2, 33, 0, 4, 10, 0, 0, 1])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Decode(_)));
        assert!(!err.is_fatal());
    }
}
