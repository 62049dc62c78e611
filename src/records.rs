/*!
 * The record types flowing through the pipeline and the cleaning rules for their raw fields.
 *
 * Spreadsheet exports are sloppy about types: an identifier column may hold integers, floats
 * (integers that picked up a ".0" on a round trip through another tool), or strings with stray
 * commas; a grade column may hold numbers, comma-decimal strings, or the "S/N" marker for
 * structures that were never graded. Rather than sniffing types at every use site, a raw cell is
 * captured once as a [Field] and every consumer goes through an explicit coercion.
 */

/** A raw spreadsheet cell value: text, a number, or nothing at all. */
#[derive(Debug, Clone, PartialEq)]
pub enum Field {
    Text(String),
    Number(f64),
    Absent,
}

impl Field {
    /// The display form of the field, or the empty string when absent.
    pub fn display_or_empty(&self) -> String {
        match self {
            Field::Text(s) => s.trim().to_owned(),
            Field::Number(n) => format_number(*n),
            Field::Absent => String::new(),
        }
    }

    /// Interpret the field as a number, accepting comma-decimal text ("12,5").
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Field::Number(n) if n.is_finite() => Some(*n),
            Field::Number(_) => None,
            Field::Text(s) => s.trim().replace(',', ".").parse::<f64>().ok(),
            Field::Absent => None,
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Field::Absent)
    }
}

/// Render a number without a trailing ".0" when it's a whole value.
fn format_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1.0e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/**
 * Canonicalize an identifier field into a comparable merge key.
 *
 * The value is rendered as a string, trimmed, stripped of commas, and stripped of every ".0"
 * fragment (floats serialized from integers). This never fails; garbage in produces an empty or
 * non-matching key, which the merge simply treats as unmatched. The output contains no comma and
 * no ".0" fragment, and normalizing an already normalized key changes nothing.
 */
pub fn normalize_key(field: &Field) -> String {
    let mut key = field.display_or_empty().replace(',', "");

    while key.contains(".0") {
        key = key.replace(".0", "");
    }

    key.trim().to_owned()
}

/** A consolidated grade: a real score, or explicitly not available. */
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Grade {
    Scored(i32),
    Missing,
}

impl Grade {
    /// The value written to the output sheet when no grade is available.
    pub const SENTINEL: i32 = -99;

    /**
     * Coerce a raw grade field.
     *
     * "S/N" (any case) means the structure was never graded. Comma decimals are accepted and the
     * value is truncated to an integer. Anything unparseable is treated the same as no grade -
     * clustering must not abort over one bad cell.
     */
    pub fn coerce(raw: &Field) -> Grade {
        match raw {
            Field::Absent => Grade::Missing,
            Field::Number(n) if n.is_finite() => Grade::Scored(*n as i32),
            Field::Number(_) => Grade::Missing,
            Field::Text(s) => {
                let s = s.trim();
                if s.eq_ignore_ascii_case("S/N") {
                    return Grade::Missing;
                }

                match s.replace(',', ".").parse::<f64>() {
                    Ok(v) if v.is_finite() => Grade::Scored(v as i32),
                    _ => Grade::Missing,
                }
            }
        }
    }

    /// The integer form used in the output sheet, with the -99 sentinel for a missing grade.
    pub fn consolidated(&self) -> i32 {
        match self {
            Grade::Scored(g) => *g,
            Grade::Missing => Grade::SENTINEL,
        }
    }

    /// Whether this is a real score inside the inclusive range. A missing grade never qualifies.
    pub fn in_range(&self, min: i32, max: i32) -> bool {
        matches!(self, Grade::Scored(g) if *g >= min && *g <= max)
    }
}

/**
 * One row of the inspection mapping sheet. The anchor side of the three-way merge: every
 * inspection row produces exactly one [MergedRecord].
 */
#[derive(Debug, Clone)]
pub struct InspectionRecord {
    /// Código (SGE) - the structure identifier used to attach cost data.
    pub sge: Field,
    /// CodPro - the project code used to attach the local unit.
    pub codpro: Field,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    /// Nota Final, exactly as it appeared in the sheet.
    pub raw_grade: Field,
    /// The state (UF) the structure belongs to.
    pub uf: Field,
    /// Identificação da OAE.
    pub structure_id: Field,
    /// Rodovia.
    pub highway: Field,
    pub km: Field,
    /// Município.
    pub municipality: Field,
    /// Status Geral.
    pub overall_status: Field,
    /// Status Detalhado.
    pub detailed_status: Field,
}

/** One row of the parametric study sheet ("Simulação"): the finalized cost for a structure. */
#[derive(Debug, Clone)]
pub struct CostRecord {
    /// SGE_AJUSTE - matched against the inspection's Código (SGE) after normalization.
    pub sge_adjusted: Field,
    /// Custo final.
    pub final_cost: Option<f64>,
    /// Extensão.
    pub length: Option<f64>,
    /// Largura.
    pub width: Option<f64>,
}

/** One row of the general control sheet: which local unit a project belongs to. */
#[derive(Debug, Clone)]
pub struct GroupRecord {
    pub codpro: Field,
    /// Unidade Local.
    pub local_unit: Option<String>,
}

/**
 * The result of the three-way merge. One per inspection row; cost and local unit stay `None`
 * when nothing matched.
 */
#[derive(Debug, Clone)]
pub struct MergedRecord {
    pub inspection: InspectionRecord,
    /// Normalized Código (SGE).
    pub merge_key: String,
    /// Normalized CodPro.
    pub codpro_key: String,
    pub final_cost: Option<f64>,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub local_unit: Option<String>,
    /// Consolidated grade derived from the raw Nota Final.
    pub grade: Grade,
}

/**
 * A merged record that passed the eligibility filter. Everything clustering and output need is
 * present and already in its final representation.
 */
#[derive(Debug, Clone)]
pub struct FilteredRecord {
    /// Código (SGE) as an integer, when the normalized key parses as one.
    pub sge: Option<i64>,
    pub codpro: String,
    pub structure_id: String,
    pub highway: String,
    pub km: String,
    pub municipality: String,
    pub overall_status: String,
    pub detailed_status: String,
    pub latitude: f64,
    pub longitude: f64,
    pub length: Option<f64>,
    pub width: Option<f64>,
    pub grade: i32,
    pub final_cost: f64,
    pub local_unit: String,
}
