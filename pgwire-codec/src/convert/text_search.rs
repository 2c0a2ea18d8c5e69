use super::{BufferRequirement, Converter, MAX_PREALLOC, read_count};
use crate::{
    Result,
    error::{Error, OutOfRangeError},
    ext::UsizeExt,
    io::{PgReader, PgWriter, ReadSource, WriteSink},
    postgres::{PgFormat, ProtocolError},
    types::{MAX_POSITIONS, TsQuery, TsQueryLexeme, TsVector, TsVectorLexeme, Weight, WordEntryPos},
};

/// Longest lexeme postgres accepts, in encoded bytes.
pub const MAX_LEXEME_LEN: usize = 2046;

fn check_text(text: &str) -> Result<(), OutOfRangeError> {
    if text.is_empty() {
        return Err(OutOfRangeError::new("empty lexeme"));
    }
    if text.len() > MAX_LEXEME_LEN {
        return Err(OutOfRangeError::new(format!(
            "lexeme is {} bytes, maximum is {MAX_LEXEME_LEN}",
            text.len()
        )));
    }
    if text.contains('\0') {
        return Err(OutOfRangeError::new("lexeme contains nul"));
    }
    Ok(())
}

/// `tsvector`, lexemes with their positions.
#[derive(Debug, Clone, Copy, Default)]
pub struct TsVectorConverter;

impl Converter for TsVectorConverter {
    type Value = TsVector;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        (format == PgFormat::Binary, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &TsVector) -> Result<usize> {
        value.len().to_i32()?;
        let mut size = 4;
        for lexeme in value {
            check_text(lexeme.text())?;
            size += lexeme.text().len() + 1 + 2 + 2 * lexeme.positions().len();
        }
        Ok(size)
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<TsVector> {
        let count = read_count(reader, "tsvector lexeme").await?;
        let mut lexemes = Vec::with_capacity(count.min(MAX_PREALLOC));

        for _ in 0..count {
            let text = reader.read_nul_string().await?;

            reader.ensure(2).await?;
            let npos = reader.read_u16() as usize;
            if npos > MAX_POSITIONS {
                return Err(ProtocolError::malformed(format!("lexeme has {npos} positions")).into());
            }

            reader.ensure(2 * npos).await?;
            let positions = (0..npos).map(|_| WordEntryPos::from_raw(reader.read_u16())).collect();
            lexemes.push(TsVectorLexeme::new(text, positions)?);
        }

        Ok(TsVector::new(lexemes))
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &TsVector) -> Result<()> {
        let count = value.len().to_i32()?;
        for lexeme in value {
            check_text(lexeme.text())?;
        }

        writer.ensure(4).await?;
        writer.write_i32(count);

        for lexeme in value {
            writer.write_nul_string(lexeme.text()).await?;
            writer.ensure(2).await?;
            writer.write_u16(lexeme.positions().len() as u16);
            for pos in lexeme.positions() {
                writer.ensure(2).await?;
                writer.write_u16(pos.raw());
            }
        }

        Ok(())
    }
}

const TOKEN_VALUE: u8 = 1;
const TOKEN_OPERATOR: u8 = 2;

const OP_NOT: u8 = 1;
const OP_AND: u8 = 2;
const OP_OR: u8 = 3;
const OP_PHRASE: u8 = 4;

/// Default limit of tsquery nesting accepted from the wire.
pub const DEFAULT_TSQUERY_DEPTH: usize = 512;

/// `tsquery`, operator tree in prefix order.
///
/// Binary operators are sent right operand first. Reading rebuilds the tree without
/// recursion, rejecting trees nested deeper than [`max_depth`][TsQueryConverter::with_max_depth].
#[derive(Debug, Clone, Copy)]
pub struct TsQueryConverter {
    max_depth: usize,
}

impl Default for TsQueryConverter {
    fn default() -> Self {
        Self { max_depth: DEFAULT_TSQUERY_DEPTH }
    }
}

impl TsQueryConverter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn max_depth(&self) -> usize {
        self.max_depth
    }
}

/// Single wire token, borrowed from the tree being written.
enum Token<'a> {
    Lexeme(&'a TsQueryLexeme),
    Operator(u8),
    Phrase(i16),
}

impl Token<'_> {
    fn size(&self) -> usize {
        match self {
            // tag, weight, prefix, text, nul
            Token::Lexeme(lexeme) => 4 + lexeme.text().len(),
            Token::Operator(_) => 2,
            Token::Phrase(_) => 4,
        }
    }
}

/// Flatten the tree into wire order, validating every node.
fn tokens(query: &TsQuery) -> Result<Vec<Token<'_>>> {
    let mut tokens = vec![];
    if query.is_empty() {
        return Ok(tokens);
    }

    let mut stack = vec![query];
    while let Some(node) = stack.pop() {
        match node {
            TsQuery::Empty => {
                return Err(OutOfRangeError::new("empty tsquery is only valid as the root").into())
            }
            TsQuery::Lexeme(lexeme) => {
                check_text(lexeme.text())?;
                tokens.push(Token::Lexeme(lexeme));
            }
            TsQuery::Not(child) => {
                tokens.push(Token::Operator(OP_NOT));
                stack.push(child);
            }
            TsQuery::And(left, right) | TsQuery::Or(left, right) => {
                let op = if matches!(node, TsQuery::And(..)) { OP_AND } else { OP_OR };
                tokens.push(Token::Operator(op));
                stack.push(left);
                stack.push(right);
            }
            TsQuery::Phrase { left, distance, right } => {
                let Ok(distance) = i16::try_from(*distance) else {
                    return Err(OutOfRangeError::new(format!("phrase distance {distance}")).into());
                };
                tokens.push(Token::Phrase(distance));
                stack.push(left);
                stack.push(right);
            }
        }
    }

    Ok(tokens)
}

enum NodeKind {
    Lexeme(TsQueryLexeme),
    Not,
    And,
    Or,
    Phrase(u16),
}

struct Pending {
    kind: NodeKind,
    children: [Option<usize>; 2],
}

async fn read_token<S: ReadSource>(reader: &mut PgReader<S>) -> Result<NodeKind> {
    reader.ensure(1).await?;
    match reader.read_u8() {
        TOKEN_VALUE => {
            reader.ensure(2).await?;
            let weight = reader.read_u8();
            let prefix = reader.read_u8() != 0;
            let text = reader.read_nul_string().await?;
            let weight = Weight::from_bits(weight)
                .map_err(|_| ProtocolError::malformed(format!("lexeme weight {weight:#x}")))?;
            Ok(NodeKind::Lexeme(TsQueryLexeme::new(text).with_weight(weight).with_prefix(prefix)))
        }
        TOKEN_OPERATOR => {
            reader.ensure(1).await?;
            match reader.read_u8() {
                OP_NOT => Ok(NodeKind::Not),
                OP_AND => Ok(NodeKind::And),
                OP_OR => Ok(NodeKind::Or),
                OP_PHRASE => {
                    reader.ensure(2).await?;
                    let distance = reader.read_i16();
                    let Ok(distance) = u16::try_from(distance) else {
                        return Err(ProtocolError::malformed(format!("phrase distance {distance}")).into());
                    };
                    Ok(NodeKind::Phrase(distance))
                }
                op => Err(ProtocolError::malformed(format!("tsquery operator {op}")).into()),
            }
        }
        tag => Err(ProtocolError::malformed(format!("tsquery token {tag}")).into()),
    }
}

fn build(nodes: Vec<Pending>) -> Result<TsQuery> {
    let missing = || Error::internal("tsquery node is missing a child");

    // children always come after their parent
    let mut built: Vec<Option<TsQuery>> = std::iter::repeat_with(|| None).take(nodes.len()).collect();
    for (idx, node) in nodes.into_iter().enumerate().rev() {
        let mut take = |slot: usize| {
            node.children[slot]
                .and_then(|child| built[child].take())
                .map(Box::new)
                .ok_or_else(missing)
        };
        let query = match node.kind {
            NodeKind::Lexeme(lexeme) => TsQuery::Lexeme(lexeme),
            NodeKind::Not => TsQuery::Not(take(0)?),
            NodeKind::And => TsQuery::And(take(0)?, take(1)?),
            NodeKind::Or => TsQuery::Or(take(0)?, take(1)?),
            NodeKind::Phrase(distance) => {
                let left = take(0)?;
                TsQuery::Phrase { left, distance, right: take(1)? }
            }
        };
        built[idx] = Some(query);
    }

    built.into_iter().next().flatten().ok_or_else(missing)
}

impl Converter for TsQueryConverter {
    type Value = TsQuery;

    fn can_convert(&self, format: PgFormat) -> (bool, BufferRequirement) {
        (format == PgFormat::Binary, BufferRequirement::Streaming)
    }

    fn get_size(&self, value: &TsQuery) -> Result<usize> {
        let tokens = tokens(value)?;
        tokens.len().to_i32()?;
        Ok(4 + tokens.iter().map(Token::size).sum::<usize>())
    }

    async fn read<S: ReadSource>(&self, reader: &mut PgReader<S>) -> Result<TsQuery> {
        let count = read_count(reader, "tsquery token").await?;
        if count == 0 {
            return Ok(TsQuery::Empty);
        }

        let mut nodes: Vec<Pending> = Vec::with_capacity(count.min(MAX_PREALLOC));
        // (node, child slot, depth of node), left slot is 0
        let mut stack: Vec<(usize, usize, usize)> = vec![];

        for _ in 0..count {
            let kind = read_token(reader).await?;
            let idx = nodes.len();

            let depth = match stack.pop() {
                Some((parent, slot, depth)) => {
                    nodes[parent].children[slot] = Some(idx);
                    depth + 1
                }
                None if nodes.is_empty() => 1,
                None => return Err(ProtocolError::malformed("tsquery has more than one root").into()),
            };

            if depth > self.max_depth {
                return Err(ProtocolError::malformed(format!(
                    "tsquery nested deeper than {}",
                    self.max_depth
                ))
                .into());
            }

            match kind {
                NodeKind::Lexeme(_) => {}
                NodeKind::Not => stack.push((idx, 0, depth)),
                NodeKind::And | NodeKind::Or | NodeKind::Phrase(_) => {
                    stack.push((idx, 0, depth));
                    stack.push((idx, 1, depth));
                }
            }

            nodes.push(Pending { kind, children: [None; 2] });
        }

        if !stack.is_empty() {
            return Err(Error::internal("tsquery ended with unfilled operands"));
        }

        build(nodes)
    }

    async fn write<S: WriteSink>(&self, writer: &mut PgWriter<S>, value: &TsQuery) -> Result<()> {
        let tokens = tokens(value)?;
        let count = tokens.len().to_i32()?;

        writer.ensure(4).await?;
        writer.write_i32(count);

        for token in tokens {
            match token {
                Token::Lexeme(lexeme) => {
                    writer.ensure(3).await?;
                    writer.write_u8(TOKEN_VALUE);
                    writer.write_u8(lexeme.weight().bits());
                    writer.write_u8(lexeme.is_prefix() as u8);
                    writer.write_nul_string(lexeme.text()).await?;
                }
                Token::Operator(op) => {
                    writer.ensure(2).await?;
                    writer.write_u8(TOKEN_OPERATOR);
                    writer.write_u8(op);
                }
                Token::Phrase(distance) => {
                    writer.ensure(4).await?;
                    writer.write_u8(TOKEN_OPERATOR);
                    writer.write_u8(OP_PHRASE);
                    writer.write_i16(distance);
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        convert::ConverterExt,
        error::ErrorKind,
        io::Chunked,
        types::PosWeight,
    };
    use bytes::{BufMut, Bytes, BytesMut};

    fn conv() -> TsQueryConverter {
        TsQueryConverter::default()
    }

    #[test]
    fn empty_query() {
        let bytes = conv().encode(&TsQuery::Empty).unwrap();
        assert_eq!(&bytes[..], &[0, 0, 0, 0]);
        assert_eq!(conv().decode(bytes.freeze()).unwrap(), TsQuery::Empty);
    }

    #[test]
    fn right_operand_first() {
        let query = TsQuery::and(TsQuery::lexeme("a"), TsQuery::lexeme("b"));
        let bytes = conv().encode(&query).unwrap();
        assert_eq!(&bytes[..], b"\0\0\0\x03\x02\x02\x01\0\0b\0\x01\0\0a\0");
        assert_eq!(conv().decode(bytes.freeze()).unwrap(), query);
    }

    #[test]
    fn round_trip() {
        let fat = TsQueryLexeme::new("fat").with_weight(Weight::A | Weight::C).with_prefix(true);
        let queries = [
            TsQuery::lexeme("cat"),
            TsQuery::not(TsQuery::lexeme("rat")),
            TsQuery::or(
                TsQuery::and(fat.clone().into(), TsQuery::not(TsQuery::lexeme("rat"))),
                TsQuery::phrase(TsQuery::lexeme("super"), 3, TsQuery::lexeme("cat")),
            ),
            TsQuery::phrase(
                TsQuery::not(TsQuery::or(fat.into(), TsQuery::lexeme("b"))),
                1,
                TsQuery::and(
                    TsQuery::lexeme("c"),
                    TsQuery::not(TsQuery::phrase(TsQuery::lexeme("d"), 2, TsQuery::lexeme("e"))),
                ),
            ),
        ];

        for query in queries {
            let bytes = conv().encode(&query).unwrap();
            let mut reader = PgReader::with_capacity(Chunked::new(bytes.freeze(), 3), 4);
            assert_eq!(conv().read_blocking(&mut reader).unwrap(), query);
        }
    }

    #[test]
    fn lexeme_length_boundary() {
        let ok = TsQuery::lexeme("x".repeat(2046));
        assert_eq!(conv().get_size(&ok).unwrap(), 4 + 4 + 2046);
        assert!(conv().encode(&ok).is_ok());

        let long = TsQuery::and(TsQuery::lexeme("a"), TsQuery::lexeme("x".repeat(2047)));
        let err = conv().get_size(&long).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OutOfRange(_)));

        let mut writer = PgWriter::new(Vec::new());
        let err = conv().write_blocking(&mut writer, &long).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OutOfRange(_)));
        assert_eq!(writer.written(), 0);
    }

    #[test]
    fn empty_child_rejected() {
        let query = TsQuery::not(TsQuery::Empty);
        let err = conv().get_size(&query).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OutOfRange(_)));
    }

    #[test]
    fn depth_limit() {
        let mut bytes = BytesMut::new();
        bytes.put_i32(4);
        for _ in 0..3 {
            bytes.put_slice(&[TOKEN_OPERATOR, OP_NOT]);
        }
        bytes.put_slice(b"\x01\0\0a\0");
        let bytes = bytes.freeze();

        let query = conv().with_max_depth(4).decode(bytes.clone()).unwrap();
        assert_eq!(query, TsQuery::not(TsQuery::not(TsQuery::not(TsQuery::lexeme("a")))));

        let err = conv().with_max_depth(3).decode(bytes).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn unfilled_operands() {
        let bytes = Bytes::from_static(b"\0\0\0\x02\x02\x02\x01\0\0a\0");
        let err = conv().decode(bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Internal(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn extra_root() {
        let bytes = Bytes::from_static(b"\0\0\0\x02\x01\0\0a\0\x01\0\0b\0");
        let err = conv().decode(bytes).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Protocol(_)));
    }

    #[test]
    fn tsvector_round_trip() {
        let vector: TsVector = [
            TsVectorLexeme::new("cat", vec![
                WordEntryPos::new(1, PosWeight::A).unwrap(),
                WordEntryPos::new(7, PosWeight::D).unwrap(),
            ])
            .unwrap(),
            TsVectorLexeme::new("fat", vec![]).unwrap(),
        ]
        .into_iter()
        .collect();

        let bytes = TsVectorConverter.encode(&vector).unwrap();
        assert_eq!(bytes.len(), 4 + (4 + 2 + 4) + (4 + 2));
        let mut reader = PgReader::with_capacity(Chunked::new(bytes.freeze(), 2), 4);
        assert_eq!(TsVectorConverter.read_blocking(&mut reader).unwrap(), vector);
    }

    #[test]
    fn empty_lexemes_rejected() {
        let vector: TsVector = [TsVectorLexeme::new("", vec![]).unwrap()].into_iter().collect();
        let err = TsVectorConverter.get_size(&vector).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OutOfRange(_)));

        let mut writer = PgWriter::new(Vec::new());
        assert!(TsVectorConverter.write_blocking(&mut writer, &vector).is_err());
        assert_eq!(writer.written(), 0);

        let err = conv().encode(&TsQuery::lexeme("")).unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::OutOfRange(_)));
    }

    #[test]
    fn tsvector_positions_boundary() {
        let pos = WordEntryPos::new(1, PosWeight::D).unwrap();
        assert!(TsVectorLexeme::new("a", vec![pos; 256]).is_ok());
        assert!(TsVectorLexeme::new("a", vec![pos; 257]).is_err());

        let mut bytes = BytesMut::new();
        bytes.put_i32(1);
        bytes.put_slice(b"a\0");
        bytes.put_u16(257);
        bytes.put_bytes(0, 2 * 257);
        let err = TsVectorConverter.decode(bytes.freeze()).unwrap_err();
        assert!(err.is_fatal());
    }
}
