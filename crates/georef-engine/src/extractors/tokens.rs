//! Lexer for memorial text
//!
//! Normalized text is read line by line. Header lines (`Key: value`) are
//! skipped, SIGEF/INCRA table rows are split into columns, and everything
//! else is scanned as narrative with a single leftmost-first alternation.
//!
//! Tokens come out in document order, with one exception: the columns of a
//! table row are emitted in the order the leg reads (station, coordinates,
//! confrontation, azimuth, distance, target) so narrative and tabular
//! memorials feed the builder the same way.

use super::header::match_header_line;
use super::numeric::{decimal_places, parse_angle, parse_azimuth, parse_decimal};
use crate::normalize::{PageIndex, PAGE_BREAK};
use georef_types::{Axis, AzimuthReference, TextPosition, Token, TokenKind, VertexRole};
use lazy_static::lazy_static;
use regex::{Captures, Regex};
use std::ops::Range;

/// SIGEF vertex code: credential, vertex type and sequence (`ABCD-M-0001`)
const SIGEF_CODE: &str = r"[A-Z0-9]{3,5}-[MPVO]-\d{1,6}[A-Z]?";

/// Any vertex label: SIGEF codes, `V1`, `P-01`, `M01A`, plain `7`
const VERTEX_LABEL: &str = r"(?:[A-Z0-9]{1,5}-)*[A-Z]{0,5}\d+[A-Z]?";

const NARRATIVE_TEMPLATE: &str = r#"(?ix)
      (?P<target>\b(?:at[ée]|ao)\s+(?:o\s+)?(?:v[ée]rtice|ponto|marco)\s+(?P<target_name>@LABEL@)\b)
    | (?P<target_code>\b(?:at[ée]|ao)\s+(?:o\s+)?(?P<target_code_name>@CODE@)\b)
    | (?P<station>\b(?:v[ée]rtice|ponto|marco)\s+(?:de\s+c[óo]digo\s+)?(?P<station_name>@LABEL@)\b)
    | (?P<code>\b(?P<code_name>@CODE@)\b)
    | (?P<crs>\b(?P<datum>SIRGAS\s*-?\s*2000|SAD\s*-?\s*69|WGS\s*-?\s*84|C[óo]rrego\s+Alegre)
          (?:[\s,/-]*(?:proje[çc][ãa]o\s+)?UTM)?
          (?:[\s,/-]*(?:zona|fuso)\s*(?P<zone>\d{1,2}\s*[NS]?)\b)?)
    | (?P<zone_only>\b(?:zona|fuso)\s+(?:UTM\s+)?(?P<zone_only_value>\d{1,2}\s*[NS]?)\b)
    | (?P<azimuth_ref>\bazimutes?\s*:?\s*(?P<azimuth_ref_kind>geod[ée]sicos?|verdadeiros?|planos?|de\s+quadr[íi]cula))
    | (?P<leg_list>\bazimutes?\s+e\s+dist[âa]ncias?\b)
    | (?P<azimuth>\bazimute(?:\s+(?:plano|geod[ée]sico|verdadeiro))?\s*(?:de\s+|:\s*|=\s*)?
          (?P<azimuth_value>[-+]?\d{1,3}(?:[.,]\d+)?
              (?:\s*°(?:\s*\d{1,2}(?:[.,]\d+)?\s*'(?:\s*\d{1,2}(?:[.,]\d+)?\b\s*"?)?)?)?))
    | (?P<azimuth_bad>\bazimute\s*(?:de|:|=)\s*(?P<azimuth_bad_value>[^\s,;]+))
    | (?P<distance>\bdist[âa]ncia\s*(?:de\s+|:\s*|=\s*)?(?P<distance_value>[-+]?(?:\d[\d.,]*\d|\d))\s*(?:metros\b|m\b)?)
    | (?P<distance_bad>\bdist[âa]ncia\s*(?:de|:|=)\s*(?P<distance_bad_value>[^\s,;]+))
    | (?P<altitude>\b(?:altitude|altura\s+elipsoidal|cota)\s*(?:\(m\)\s*)?(?:de\s+|:\s*|=\s*)?
          (?P<altitude_value>-?(?:\d[\d.,]*\d|\d))\s*(?:metros\b|m\b)?)
    | (?P<summary>\b(?:per[íi]metro|[áa]rea)(?:\s+total)?\s*(?:de\s+|:\s*|=\s*)?\d[\d.,]*\s*(?:m²|ha\b|metros\b|m\b)?)
    | (?P<coord>\b(?P<axis>norte|leste|este|latitude|lat|longitude|long|lon|(?-i:N|E|X|Y))\s*[:=]?\s*
          (?P<coord_value>[-+]?(?:\d[\d.,]*\d|\d)(?:\s*°\s*\d{1,2}\s*'\s*\d{1,2}(?:[.,]\d+)?\s*"?|\s*°)?)
          (?:\s*(?P<coord_hemi>(?-i:[NSWOL]))\b)?)
    | (?P<geo>(?P<geo_value>[-+]?\d{1,3}\s*°\s*\d{1,2}\s*'\s*\d{1,2}(?:[.,]\d+)?\s*"?)
          (?:\s*(?P<geo_hemi>(?-i:[NSWOL]))\b)?)
    | (?P<owner>\bconfront(?:a|ando|ante|antes|a[çc][ãa]o|a[çc][õo]es)\b[\x20\t]*(?:com[\x20\t]+|:[\x20\t]*)?
          (?P<owner_name>[^,;\n\x0C]+))
    | (?P<measure>(?P<measure_value>\d[\d.,]*\d|\d)\s*(?:metros\b|m\b))
    | (?P<number>[-+]?(?:\d[\d.,]*\d|\d))
"#;

const TABLE_ROW_TEMPLATE: &str = r#"(?x)^
    (?P<from>@TABLE_CODE@)\s+
    (?P<c1>@TABLE_COORD@)\s+
    (?P<c2>@TABLE_COORD@)\s+
    (?P<alt>-?(?:\d[\d.,]*\d|\d))\s+
    (?P<to>@TABLE_CODE@)\s+
    (?P<az>\d{1,3}(?:[.,]\d+)?(?:\s?°(?:\s?\d{1,2}(?:[.,]\d+)?\s?'(?:\s?\d{1,2}(?:[.,]\d+)?\s?"?)?)?)?)\s+
    (?P<dist>-?(?:\d[\d.,]*\d|\d))
    (?:\s+(?P<owner>.*?))?\s*$
"#;

const TABLE_CODE: &str = r"(?:[A-Z0-9]{3,5}-[MPVO]-\d{1,6}[A-Z]?|[A-Z]{1,3}-?\d{1,4}[A-Z]?)";

const TABLE_COORD: &str = r#"(?:[-+]?\d{1,3}\s?°\s?\d{1,2}\s?'\s?\d{1,2}(?:[.,]\d+)?\s?"?(?:\s?[NSWOL]\b)?|\d[\d.,]*\d)"#;

lazy_static! {
    static ref NARRATIVE: Regex = Regex::new(
        &NARRATIVE_TEMPLATE
            .replace("@LABEL@", VERTEX_LABEL)
            .replace("@CODE@", SIGEF_CODE)
    )
    .unwrap();

    static ref TABLE_ROW: Regex = Regex::new(
        &TABLE_ROW_TEMPLATE
            .replace("@TABLE_CODE@", TABLE_CODE)
            .replace("@TABLE_COORD@", TABLE_COORD)
    )
    .unwrap();

    /// Where a confronting owner's name stops when no comma ends it
    static ref OWNER_STOP: Regex = Regex::new(
        r"(?i)\s+(?:e\s+|com\s+)?(?:azimute|dist[âa]ncia|at[ée]\b|ao\s+v[ée]rtice|v[ée]rtice\b|deste\b)"
    )
    .unwrap();

    static ref REFERENCE: Regex = Regex::new(
        r"(?ix)
          \b(?P<datum>SIRGAS\s*-?\s*2000|SAD\s*-?\s*69|WGS\s*-?\s*84|C[óo]rrego\s+Alegre)
        | \b(?:zona|fuso)\s*(?:UTM\s*)?(?P<zone>\d{1,2}\s*[NS]?)\b"
    )
    .unwrap();
}

/// Tokens of one document plus the document-wide azimuth reference
#[derive(Debug, Clone, Default)]
pub struct LexOutput {
    pub tokens: Vec<Token>,
    pub azimuth_reference: AzimuthReference,
}

/// Tokenize normalized memorial text
pub fn tokenize(text: &str) -> LexOutput {
    let mut lexer = Lexer::new(text);
    lexer.run();
    LexOutput {
        tokens: lexer.tokens,
        azimuth_reference: lexer.azimuth_reference,
    }
}

/// Canonical label of a reference-system mention, e.g. `SIRGAS2000 / UTM 22S`
pub fn canonical_reference(text: &str) -> Option<String> {
    let mut datum = None;
    let mut zone = None;
    for caps in REFERENCE.captures_iter(text) {
        if let Some(d) = caps.name("datum") {
            datum.get_or_insert_with(|| canonical_datum(d.as_str()));
        }
        if let Some(z) = caps.name("zone") {
            zone.get_or_insert_with(|| canonical_zone(z.as_str()));
        }
    }
    match (datum, zone) {
        (Some(d), Some(z)) => Some(format!("{} / UTM {}", d, z)),
        (Some(d), None) => Some(d),
        (None, Some(z)) => Some(format!("UTM {}", z)),
        (None, None) => None,
    }
}

/// Fold a new reference mention into the one in force.
///
/// A bare zone (`UTM 22S`) completes the datum already declared.
pub fn merge_reference(current: Option<&str>, new: &str) -> String {
    match current {
        Some(current) if new.starts_with("UTM ") => {
            let datum = current.split(" / ").next().unwrap_or(current);
            if datum.starts_with("UTM ") {
                new.to_string()
            } else {
                format!("{} / {}", datum, new)
            }
        }
        _ => new.to_string(),
    }
}

fn canonical_datum(raw: &str) -> String {
    let compact: String = raw
        .chars()
        .filter(|c| !c.is_whitespace() && *c != '-')
        .flat_map(char::to_uppercase)
        .map(|c| if c == 'Ó' { 'O' } else { c })
        .collect();
    if compact == "CORREGOALEGRE" {
        "CORREGO ALEGRE".to_string()
    } else {
        compact
    }
}

fn canonical_zone(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

fn axis_for_label(label: &str, geographic: bool) -> Axis {
    let lower = label.to_lowercase();
    if lower.starts_with("lat") {
        Axis::Latitude
    } else if lower.starts_with("lon") {
        Axis::Longitude
    } else if matches!(lower.as_str(), "norte" | "n" | "y") {
        if geographic {
            Axis::Latitude
        } else {
            Axis::Northing
        }
    } else if geographic {
        Axis::Longitude
    } else {
        Axis::Easting
    }
}

struct Lexer<'a> {
    text: &'a str,
    pages: PageIndex,
    tokens: Vec<Token>,
    azimuth_reference: AzimuthReference,
    /// "com os seguintes azimutes e distâncias": unlabeled angles are azimuths
    leg_list: bool,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            text,
            pages: PageIndex::new(text),
            tokens: Vec::new(),
            azimuth_reference: AzimuthReference::Unspecified,
            leg_list: false,
        }
    }

    fn run(&mut self) {
        let mut block: Option<Range<usize>> = None;
        let mut start = 0;
        let text = self.text;

        for line in text.split(['\n', PAGE_BREAK]) {
            let span = start..start + line.len();
            start = span.end + 1;

            let is_header = match_header_line(line).is_some();
            let row = if is_header { None } else { TABLE_ROW.captures(line) };

            if is_header || row.is_some() {
                if let Some(range) = block.take() {
                    self.scan_narrative(range);
                }
                if let Some(row) = row {
                    self.emit_table_row(&row, span.start);
                }
            } else {
                block = match block {
                    Some(range) => Some(range.start..span.end),
                    None => Some(span),
                };
            }
        }
        if let Some(range) = block {
            self.scan_narrative(range);
        }
    }

    fn last_kind(&self) -> Option<TokenKind> {
        self.tokens.last().map(|t| t.kind)
    }

    fn push(&mut self, kind: TokenKind, span: Range<usize>, text: String, value: Option<f64>, decimals: Option<u8>) {
        self.tokens.push(Token {
            kind,
            text,
            position: TextPosition {
                start_offset: span.start,
                end_offset: span.end,
            },
            page: self.pages.page_of(span.start),
            value,
            decimals,
        });
    }

    fn push_vertex(&mut self, role: VertexRole, span: Range<usize>, label: &str) {
        self.push(TokenKind::VertexName(role), span, label.to_uppercase(), None, None);
    }

    fn push_azimuth(&mut self, span: Range<usize>, raw: &str) {
        match (parse_azimuth(raw), parse_angle(raw)) {
            (Ok(azimuth), Ok(angle)) => self.push(
                TokenKind::Azimuth,
                span,
                raw.to_string(),
                Some(azimuth),
                Some(angle.decimals),
            ),
            _ => self.push(TokenKind::MalformedLeg, span, raw.to_string(), None, None),
        }
    }

    fn push_distance(&mut self, span: Range<usize>, raw: &str) {
        match parse_decimal(raw) {
            Some(distance) if distance > 0.0 && distance.is_finite() => self.push(
                TokenKind::Distance,
                span,
                raw.to_string(),
                Some(distance),
                Some(decimal_places(raw)),
            ),
            _ => self.push(TokenKind::MalformedLeg, span, raw.to_string(), None, None),
        }
    }

    fn push_coordinate(&mut self, axis: Axis, span: Range<usize>, raw: &str) {
        let parsed = if raw.contains('°') {
            parse_angle(raw).ok().map(|a| (a.degrees, a.decimals))
        } else {
            parse_decimal(raw).map(|v| (v, decimal_places(raw)))
        };
        match parsed {
            Some((value, decimals)) => self.push(
                TokenKind::Coordinate(axis),
                span,
                raw.to_string(),
                Some(value),
                Some(decimals),
            ),
            None => self.push(TokenKind::Unknown, span, raw.to_string(), None, None),
        }
    }

    fn emit_table_row(&mut self, row: &Captures<'_>, line_start: usize) {
        let span = |name: &str| {
            row.name(name)
                .map(|m| line_start + m.start()..line_start + m.end())
                .unwrap_or(line_start..line_start)
        };
        let text = |name: &str| row.name(name).map(|m| m.as_str()).unwrap_or_default();

        self.push_vertex(VertexRole::Station, span("from"), text("from"));

        let (c1, c2) = (text("c1"), text("c2"));
        if c1.contains('°') || c2.contains('°') {
            // Longitude then latitude unless the hemispheres say otherwise
            let c1_is_latitude = c1.trim_end().ends_with(['N', 'S']);
            let (first, second) = if c1_is_latitude {
                (Axis::Latitude, Axis::Longitude)
            } else {
                (Axis::Longitude, Axis::Latitude)
            };
            self.push_coordinate(first, span("c1"), c1);
            self.push_coordinate(second, span("c2"), c2);
        } else {
            let v1 = parse_decimal(c1).unwrap_or_default();
            let v2 = parse_decimal(c2).unwrap_or_default();
            let (first, second) = if v1 > 1_000_000.0 && v2 < 1_000_000.0 {
                (Axis::Northing, Axis::Easting)
            } else {
                (Axis::Easting, Axis::Northing)
            };
            self.push_coordinate(first, span("c1"), c1);
            self.push_coordinate(second, span("c2"), c2);
        }
        self.push_coordinate(Axis::Altitude, span("alt"), text("alt"));

        let owner = text("owner").trim();
        if !owner.is_empty() {
            self.push(TokenKind::OwnerName, span("owner"), owner.to_string(), None, None);
        }
        self.push_azimuth(span("az"), text("az"));
        self.push_distance(span("dist"), text("dist"));
        self.push_vertex(VertexRole::Target, span("to"), text("to"));
    }

    fn scan_narrative(&mut self, block: Range<usize>) {
        let text = self.text;
        let slice = &text[block.clone()];
        let base = block.start;
        let mut pos = 0;

        while pos < slice.len() {
            let Some(caps) = NARRATIVE.captures_at(slice, pos) else {
                break;
            };
            let Some(whole) = caps.get(0) else {
                break;
            };
            let next = self.classify(&caps, base).unwrap_or(whole.end());
            pos = if next > pos { next } else { whole.end() };
        }
        self.leg_list = false;
    }

    /// Emit the token for one narrative match. Returns where scanning should
    /// resume when that differs from the end of the match.
    fn classify(&mut self, caps: &Captures<'_>, base: usize) -> Option<usize> {
        let abs = |m: regex::Match<'_>| base + m.start()..base + m.end();

        if let Some(name) = caps.name("target_name").or_else(|| caps.name("target_code_name")) {
            self.push_vertex(VertexRole::Target, abs(name), name.as_str());
        } else if let Some(name) = caps.name("station_name").or_else(|| caps.name("code_name")) {
            self.push_vertex(VertexRole::Station, abs(name), name.as_str());
        } else if let Some(crs) = caps.name("crs") {
            let mut label = caps
                .name("datum")
                .map(|d| canonical_datum(d.as_str()))
                .unwrap_or_default();
            if let Some(zone) = caps.name("zone") {
                label = format!("{} / UTM {}", label, canonical_zone(zone.as_str()));
            }
            self.push(TokenKind::ReferenceSystem, abs(crs), label, None, None);
        } else if let Some(zone) = caps.name("zone_only_value") {
            let label = format!("UTM {}", canonical_zone(zone.as_str()));
            let span = caps.name("zone_only").map(abs).unwrap_or_else(|| abs(zone));
            self.push(TokenKind::ReferenceSystem, span, label, None, None);
        } else if let Some(kind) = caps.name("azimuth_ref_kind") {
            if self.azimuth_reference == AzimuthReference::Unspecified {
                let kind = kind.as_str().to_lowercase();
                self.azimuth_reference = if kind.starts_with("geod") || kind.starts_with("verdadeir") {
                    AzimuthReference::Geodetic
                } else {
                    AzimuthReference::Grid
                };
            }
        } else if caps.name("leg_list").is_some() {
            self.leg_list = true;
        } else if let Some(value) = caps.name("azimuth_value") {
            let span = caps.name("azimuth").map(abs).unwrap_or_else(|| abs(value));
            self.push_azimuth(span, value.as_str());
        } else if let Some(value) = caps.name("azimuth_bad_value") {
            let span = caps.name("azimuth_bad").map(abs).unwrap_or_else(|| abs(value));
            self.push(TokenKind::MalformedLeg, span, value.as_str().to_string(), None, None);
        } else if let Some(value) = caps.name("distance_value") {
            let span = caps.name("distance").map(abs).unwrap_or_else(|| abs(value));
            self.push_distance(span, value.as_str());
        } else if let Some(value) = caps.name("distance_bad_value") {
            let span = caps.name("distance_bad").map(abs).unwrap_or_else(|| abs(value));
            self.push(TokenKind::MalformedLeg, span, value.as_str().to_string(), None, None);
        } else if let Some(value) = caps.name("altitude_value") {
            self.push_coordinate(Axis::Altitude, abs(value), value.as_str());
        } else if let Some(summary) = caps.name("summary") {
            self.push(TokenKind::Unknown, abs(summary), summary.as_str().to_string(), None, None);
        } else if let (Some(axis), Some(value)) = (caps.name("axis"), caps.name("coord_value")) {
            return self.classify_coordinate(caps, axis, value, base);
        } else if let Some(value) = caps.name("geo_value") {
            let hemisphere = caps.name("geo_hemi").map(|h| h.as_str());
            let span = caps.name("geo").map(abs).unwrap_or_else(|| abs(value));
            self.classify_unlabeled_angle(span, value.as_str(), hemisphere);
        } else if let Some(name) = caps.name("owner_name") {
            return self.classify_owner(name, base);
        } else if let Some(value) = caps.name("measure_value") {
            let span = caps.name("measure").map(abs).unwrap_or_else(|| abs(value));
            self.push_distance(span, value.as_str());
        } else if let Some(value) = caps.name("number") {
            if self.last_kind() == Some(TokenKind::Azimuth) {
                self.push_distance(abs(value), value.as_str());
            } else {
                self.push(
                    TokenKind::Unknown,
                    abs(value),
                    value.as_str().to_string(),
                    parse_decimal(value.as_str()),
                    None,
                );
            }
        }
        None
    }

    fn classify_coordinate(
        &mut self,
        caps: &Captures<'_>,
        axis: regex::Match<'_>,
        value: regex::Match<'_>,
        base: usize,
    ) -> Option<usize> {
        let raw = value.as_str();
        let geographic = raw.contains('°');
        let axis_kind = axis_for_label(axis.as_str(), geographic);
        self.leg_list = false;

        // A hemisphere letter only belongs to an angle; after a projected
        // value it is the next axis label
        match caps.name("coord_hemi") {
            Some(hemi) if geographic => {
                let joined = format!("{} {}", raw, hemi.as_str());
                self.push_coordinate(axis_kind, base + axis.start()..base + hemi.end(), &joined);
                None
            }
            Some(_) => {
                self.push_coordinate(axis_kind, base + axis.start()..base + value.end(), raw);
                Some(value.end())
            }
            None => {
                let end = caps.get(0).map(|m| m.end()).unwrap_or(value.end());
                self.push_coordinate(axis_kind, base + axis.start()..base + end, raw);
                None
            }
        }
    }

    fn classify_unlabeled_angle(&mut self, span: Range<usize>, raw: &str, hemisphere: Option<&str>) {
        let axis = match hemisphere {
            Some("N") | Some("S") => Axis::Latitude,
            Some(_) => Axis::Longitude,
            None if self.leg_list => {
                self.push_azimuth(span, raw);
                return;
            }
            None if self.last_kind() == Some(TokenKind::Coordinate(Axis::Longitude)) => Axis::Latitude,
            None => Axis::Longitude,
        };
        let joined = match hemisphere {
            Some(h) => format!("{} {}", raw, h),
            None => raw.to_string(),
        };
        self.push_coordinate(axis, span, &joined);
    }

    fn classify_owner(&mut self, name: regex::Match<'_>, base: usize) -> Option<usize> {
        let raw = name.as_str();
        let cut = OWNER_STOP.find(raw).map(|m| m.start()).unwrap_or(raw.len());
        let owner = raw[..cut].trim().trim_end_matches(['.', ':']).trim();
        if !owner.is_empty() {
            let span = base + name.start()..base + name.start() + cut;
            self.push(TokenKind::OwnerName, span, owner.to_string(), None, None);
        }
        if cut < raw.len() {
            Some(name.start() + cut)
        } else {
            None
        }
    }
}
