use super::{BufferRequirement, Converter, FixedConverter, MAX_PREALLOC, impl_fixed, read_count};
use crate::{
    Result,
    ext::UsizeExt,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{PgFormat, ProtocolError},
    types::{Circle, Line, LineSegment, Path, PgBox, Point, Polygon},
};

const POINT_SIZE: usize = 16;

fn read_point<S>(reader: &mut PgReader<S>) -> Point {
    Point::new(reader.read_f64(), reader.read_f64())
}

fn write_point<S>(writer: &mut PgWriter<S>, point: &Point) {
    writer.write_f64(point.x);
    writer.write_f64(point.y);
}

/// `point`, `x` then `y`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PointConverter;

impl FixedConverter for PointConverter {
    type Value = Point;

    const SIZE: usize = POINT_SIZE;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Point> {
        Ok(read_point(reader))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Point) -> Result<()> {
        write_point(writer, value);
        Ok(())
    }
}

/// `line`, coefficients `a`, `b`, `c`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineConverter;

impl FixedConverter for LineConverter {
    type Value = Line;

    const SIZE: usize = 24;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Line> {
        Ok(Line::new(reader.read_f64(), reader.read_f64(), reader.read_f64()))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Line) -> Result<()> {
        writer.write_f64(value.a);
        writer.write_f64(value.b);
        writer.write_f64(value.c);
        Ok(())
    }
}

/// `lseg`, start point then end point.
#[derive(Debug, Clone, Copy, Default)]
pub struct LineSegmentConverter;

impl FixedConverter for LineSegmentConverter {
    type Value = LineSegment;

    const SIZE: usize = POINT_SIZE * 2;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<LineSegment> {
        let start = read_point(reader);
        let end = read_point(reader);
        Ok(LineSegment::new(start, end))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &LineSegment) -> Result<()> {
        write_point(writer, &value.start);
        write_point(writer, &value.end);
        Ok(())
    }
}

/// `box`, upper right corner then lower left corner.
#[derive(Debug, Clone, Copy, Default)]
pub struct BoxConverter;

impl FixedConverter for BoxConverter {
    type Value = PgBox;

    const SIZE: usize = POINT_SIZE * 2;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<PgBox> {
        let upper_right = read_point(reader);
        let lower_left = read_point(reader);
        Ok(PgBox::from_wire(upper_right, lower_left))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &PgBox) -> Result<()> {
        write_point(writer, &value.upper_right());
        write_point(writer, &value.lower_left());
        Ok(())
    }
}

/// `circle`, center then radius.
#[derive(Debug, Clone, Copy, Default)]
pub struct CircleConverter;

impl FixedConverter for CircleConverter {
    type Value = Circle;

    const SIZE: usize = 24;

    fn read_fixed<S>(&self, reader: &mut PgReader<S>) -> Result<Circle> {
        let center = read_point(reader);
        Ok(Circle::new(center, reader.read_f64()))
    }

    fn write_fixed<S>(&self, writer: &mut PgWriter<S>, value: &Circle) -> Result<()> {
        write_point(writer, &value.center());
        writer.write_f64(value.radius);
        Ok(())
    }
}

impl_fixed!(PointConverter, LineConverter, LineSegmentConverter, BoxConverter, CircleConverter);

async fn read_points<S: ReadSource>(reader: &mut PgReader<S>, count: usize) -> Result<Vec<Point>> {
    let mut points = Vec::with_capacity(count.min(MAX_PREALLOC));
    for _ in 0..count {
        reader.ensure(POINT_SIZE).await?;
        points.push(read_point(reader));
    }
    Ok(points)
}

async fn write_points<S: WriteSink>(writer: &mut PgWriter<S>, points: &[Point]) -> Result<()> {
    for point in points {
        writer.ensure(POINT_SIZE).await?;
        write_point(writer, point);
    }
    Ok(())
}

/// `path`, closed flag, point count, then points.
///
/// Points are streamed, the path is never required to fit in the buffer.
#[derive(Debug, Clone, Copy, Default)]
pub struct PathConverter;

impl Converter for PathConverter {
    type Value = Path;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        (format == PgFormat::Binary, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &Path) -> Result<usize> {
        value.points.len().to_i32()?;
        Ok(1 + 4 + POINT_SIZE * value.points.len())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Path> {
        reader.ensure(1).await?;
        let open = match reader.read_u8() {
            1 => false,
            0 => true,
            flag => return Err(ProtocolError::malformed(format!("path closed flag {flag}")).into()),
        };
        let count = read_count(reader, "path point").await?;
        let points = read_points(reader, count).await?;
        Ok(Path { points, open })
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Path) -> Result<()> {
        let count = value.points.len().to_i32()?;
        writer.ensure(5).await?;
        writer.write_u8(if value.open { 0 } else { 1 });
        writer.write_i32(count);
        write_points(writer, &value.points).await
    }
}

/// `polygon`, point count then points.
#[derive(Debug, Clone, Copy, Default)]
pub struct PolygonConverter;

impl Converter for PolygonConverter {
    type Value = Polygon;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        (format == PgFormat::Binary, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &Polygon) -> Result<usize> {
        value.points.len().to_i32()?;
        Ok(4 + POINT_SIZE * value.points.len())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<Polygon> {
        let count = read_count(reader, "polygon point").await?;
        let points = read_points(reader, count).await?;
        Ok(Polygon { points })
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &Polygon) -> Result<()> {
        let count = value.points.len().to_i32()?;
        writer.ensure(4).await?;
        writer.write_i32(count);
        write_points(writer, &value.points).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{convert::ConverterExt, error::ErrorKind, io::Chunked};
    use bytes::{BufMut, Bytes, BytesMut};

    #[test]
    fn box_wire_order() {
        let value = PgBox::new(Point::new(1.0, 4.0), Point::new(3.0, 2.0));
        let bytes = BoxConverter.encode(&value).unwrap();

        let mut expected = BytesMut::new();
        for v in [3.0f64, 4.0, 1.0, 2.0] {
            expected.put_f64(v);
        }
        assert_eq!(bytes, expected);
        assert_eq!(BoxConverter.decode(bytes.freeze()).unwrap(), value);
    }

    fn reencode<C: ConverterExt>(converter: C, wire: &[f64]) {
        let mut bytes = BytesMut::new();
        for v in wire {
            bytes.put_f64(*v);
        }
        let value = converter.decode(bytes.clone().freeze()).unwrap();
        let again = converter.encode(&value).unwrap();
        assert_eq!(again, bytes, "{wire:?}");
    }

    #[test]
    fn special_floats_keep_bits() {
        let nan = f64::NAN;
        let inf = f64::INFINITY;
        reencode(PointConverter, &[nan, -0.0]);
        reencode(PointConverter, &[-inf, inf]);
        reencode(LineConverter, &[nan, -0.0, inf]);
        reencode(LineSegmentConverter, &[-0.0, nan, -inf, 0.0]);
        reencode(BoxConverter, &[nan, 1.0, 0.0, 0.0]);
        reencode(BoxConverter, &[inf, -0.0, -inf, nan]);
        reencode(BoxConverter, &[0.0, 0.0, -0.0, -0.0]);
        reencode(CircleConverter, &[nan, -0.0, inf]);
    }

    #[test]
    fn box_new_keeps_nan() {
        let value = PgBox::new(Point::new(f64::NAN, 1.0), Point::new(0.0, 2.0));
        assert!(value.upper_right().x.is_nan());
        assert_eq!(value.lower_left().x, 0.0);
        assert_eq!(value.upper_right().y, 2.0);
        assert_eq!(value.lower_left().y, 1.0);

        let value = PgBox::new(Point::new(-0.0, 0.0), Point::new(0.0, -0.0));
        assert!(value.upper_right().x.is_sign_negative());
        assert!(value.lower_left().y.is_sign_negative());
    }

    #[test]
    fn fixed_values() {
        let circle = Circle::new(Point::new(1.5, -2.0), 3.0);
        let bytes = CircleConverter.encode(&circle).unwrap();
        assert_eq!(bytes.len(), 24);
        assert_eq!(CircleConverter.decode(bytes.freeze()).unwrap(), circle);

        let line = Line::new(1.0, -1.0, 0.5);
        let bytes = LineConverter.encode(&line).unwrap();
        assert_eq!(&bytes[..8], &1.0f64.to_be_bytes());
        assert_eq!(LineConverter.decode(bytes.freeze()).unwrap(), line);

        let (ok, req) = LineSegmentConverter.can_convert(PgFormat::Binary);
        assert!(ok);
        assert_eq!(req, BufferRequirement::Fixed(32));
        assert!(!PointConverter.can_convert(PgFormat::Text).0);
    }

    #[test]
    fn path_streams_over_chunks() {
        let path = Path::closed((0..40).map(|i| Point::new(i as f64, -(i as f64))).collect());
        let bytes = PathConverter.encode(&path).unwrap();
        assert_eq!(bytes.len(), PathConverter.get_size(&path).unwrap());
        assert_eq!(bytes[0], 1);

        let mut reader = PgReader::with_capacity(Chunked::new(bytes.freeze(), 7), 16);
        let decoded = PathConverter.read_blocking(&mut reader).unwrap();
        assert_eq!(decoded, path);
    }

    #[test]
    fn path_flag() {
        let mut bytes = BytesMut::new();
        bytes.put_u8(0);
        bytes.put_i32(1);
        bytes.put_f64(1.0);
        bytes.put_f64(2.0);
        let path = PathConverter.decode(bytes.freeze()).unwrap();
        assert!(path.open);
        assert_eq!(path.points, [Point::new(1.0, 2.0)]);

        let err = PathConverter.decode(Bytes::from_static(&[2, 0, 0, 0, 0])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn polygon_negative_count() {
        let err = PolygonConverter.decode(Bytes::from_static(&[0xff, 0xff, 0xff, 0xff])).unwrap_err();
        assert!(err.is_fatal());

        let polygon = Polygon::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 1.0)]);
        let bytes = PolygonConverter.encode(&polygon).unwrap();
        assert_eq!(bytes.len(), 4 + 32);
        assert_eq!(PolygonConverter.decode(bytes.freeze()).unwrap(), polygon);
    }

    #[test]
    fn truncated_point_is_eof() {
        let err = PointConverter.decode(Bytes::from_static(&[0; 9])).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Io(_)));
    }
}
