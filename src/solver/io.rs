//! Model file reader and writer
//!
//! The line-oriented text format of the reference solver, reproduced
//! byte-for-byte so model files interoperate with external tooling:
//! header key–value lines, then `SV` and one line per support vector with
//! `%.17g` coefficients and `index:%.8g` feature pairs.

use std::fmt;
use std::io::{BufRead, Write};
use std::path::Path;

use crate::core::{KernelType, SvmModel, SvmNode, SvmParameter, SvmType};

// ─── C printf %g-style formatting ───────────────────────────────────
//
// `%.Pg` picks fixed or scientific notation from the exponent and strips
// trailing zeros; Rust has no built-in equivalent, so the POSIX rules are
// replicated here: scientific when exponent < -4 or >= precision, fixed
// otherwise, exponent zero-padded to two digits.

struct Gfmt {
    value: f64,
    precision: usize,
}

impl fmt::Display for Gfmt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let v = self.value;
        let p = self.precision;

        if !v.is_finite() {
            return write!(f, "{}", v);
        }
        if v == 0.0 {
            return write!(f, "{}", if v.is_sign_negative() { "-0" } else { "0" });
        }

        let exp = v.abs().log10().floor() as i32;
        if exp < -4 || exp >= p as i32 {
            let s = format!("{:.prec$e}", v, prec = p.saturating_sub(1));
            match s.split_once('e') {
                Some((mantissa, exponent)) => {
                    let mantissa = mantissa.trim_end_matches('0').trim_end_matches('.');
                    let exp_val: i32 = exponent.parse().unwrap_or(0);
                    if exp_val < 0 {
                        write!(f, "{}e-{:02}", mantissa, -exp_val)
                    } else {
                        write!(f, "{}e+{:02}", mantissa, exp_val)
                    }
                }
                None => write!(f, "{}", s),
            }
        } else {
            let decimals = if exp >= 0 {
                p.saturating_sub((exp + 1) as usize)
            } else {
                p + (-1 - exp) as usize
            };
            let s = format!("{:.prec$}", v, prec = decimals);
            write!(f, "{}", s.trim_end_matches('0').trim_end_matches('.'))
        }
    }
}

fn fmt_17g(value: f64) -> Gfmt {
    Gfmt {
        value,
        precision: 17,
    }
}

fn fmt_8g(value: f64) -> Gfmt {
    Gfmt {
        value,
        precision: 8,
    }
}

// ─── Keyword tables ─────────────────────────────────────────────────

const SVM_TYPES: [(&str, SvmType); 5] = [
    ("c_svc", SvmType::CSvc),
    ("nu_svc", SvmType::NuSvc),
    ("one_class", SvmType::OneClass),
    ("epsilon_svr", SvmType::EpsilonSvr),
    ("nu_svr", SvmType::NuSvr),
];

const KERNEL_TYPES: [(&str, KernelType); 5] = [
    ("linear", KernelType::Linear),
    ("polynomial", KernelType::Polynomial),
    ("rbf", KernelType::Rbf),
    ("sigmoid", KernelType::Sigmoid),
    ("precomputed", KernelType::Precomputed),
];

fn svm_type_name(t: SvmType) -> &'static str {
    SVM_TYPES[t as usize].0
}

fn kernel_type_name(t: KernelType) -> &'static str {
    KERNEL_TYPES[t as usize].0
}

// ─── Writing ────────────────────────────────────────────────────────

/// Write a model in the solver's text format.
pub fn write_model(mut w: impl Write, model: &SvmModel) -> std::io::Result<()> {
    let param = &model.param;

    writeln!(w, "svm_type {}", svm_type_name(param.svm_type))?;
    writeln!(w, "kernel_type {}", kernel_type_name(param.kernel_type))?;

    if param.kernel_type == KernelType::Polynomial {
        writeln!(w, "degree {}", param.degree)?;
    }
    if param.kernel_type.uses_gamma() {
        writeln!(w, "gamma {}", fmt_17g(param.gamma))?;
    }
    if param.kernel_type.uses_coef0() {
        writeln!(w, "coef0 {}", fmt_17g(param.coef0))?;
    }

    writeln!(w, "nr_class {}", model.nr_class)?;
    writeln!(w, "total_sv {}", model.sv.len())?;

    write!(w, "rho")?;
    for r in &model.rho {
        write!(w, " {}", fmt_17g(*r))?;
    }
    writeln!(w)?;

    if !model.label.is_empty() {
        write!(w, "label")?;
        for lab in &model.label {
            write!(w, " {}", lab)?;
        }
        writeln!(w)?;
    }

    if !model.prob_a.is_empty() {
        write!(w, "probA")?;
        for v in &model.prob_a {
            write!(w, " {}", fmt_17g(*v))?;
        }
        writeln!(w)?;
    }
    if !model.prob_b.is_empty() {
        write!(w, "probB")?;
        for v in &model.prob_b {
            write!(w, " {}", fmt_17g(*v))?;
        }
        writeln!(w)?;
    }

    if !model.n_sv.is_empty() {
        write!(w, "nr_sv")?;
        for n in &model.n_sv {
            write!(w, " {}", n)?;
        }
        writeln!(w)?;
    }

    writeln!(w, "SV")?;
    for (i, sv) in model.sv.iter().enumerate() {
        for coef_row in &model.sv_coef {
            write!(w, "{} ", fmt_17g(coef_row[i]))?;
        }
        if param.kernel_type == KernelType::Precomputed {
            if let Some(node) = sv.first() {
                write!(w, "0:{} ", node.value as i32)?;
            }
        } else {
            for node in sv {
                write!(w, "{}:{} ", node.index, fmt_8g(node.value))?;
            }
        }
        writeln!(w)?;
    }

    Ok(())
}

/// Save a model to `path`. Returns `false` on any failure, mirroring the
/// reference solver's negative return code.
pub fn save_model(path: &Path, model: &SvmModel) -> bool {
    let file = match std::fs::File::create(path) {
        Ok(f) => f,
        Err(_) => return false,
    };
    let mut writer = std::io::BufWriter::new(file);
    write_model(&mut writer, model)
        .and_then(|_| writer.flush())
        .is_ok()
}

// ─── Reading ────────────────────────────────────────────────────────

/// Read a model from the solver's text format. `None` on any malformed
/// content, mirroring the reference solver's NULL return.
pub fn read_model(reader: impl BufRead) -> Option<SvmModel> {
    parse_model(reader).ok()
}

/// Load a model from `path`. `None` when the file is missing or
/// malformed.
pub fn load_model(path: &Path) -> Option<SvmModel> {
    let file = std::fs::File::open(path).ok()?;
    read_model(std::io::BufReader::new(file))
}

fn parse_model(reader: impl BufRead) -> Result<SvmModel, String> {
    let mut lines = reader.lines();

    let mut param = SvmParameter::default();
    let mut nr_class = 0usize;
    let mut total_sv = 0usize;
    let mut rho = Vec::new();
    let mut label = Vec::new();
    let mut prob_a = Vec::new();
    let mut prob_b = Vec::new();
    let mut n_sv = Vec::new();

    loop {
        let line = lines
            .next()
            .ok_or_else(|| "unexpected end of file in header".to_string())?
            .map_err(|e| e.to_string())?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        let keyword = parts.next().expect("non-empty line has a first token");

        match keyword {
            "svm_type" => {
                let name = parts.next().ok_or("missing svm_type value")?;
                param.svm_type = SVM_TYPES
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|&(_, t)| t)
                    .ok_or_else(|| format!("unknown svm_type: {}", name))?;
            }
            "kernel_type" => {
                let name = parts.next().ok_or("missing kernel_type value")?;
                param.kernel_type = KERNEL_TYPES
                    .iter()
                    .find(|(n, _)| *n == name)
                    .map(|&(_, t)| t)
                    .ok_or_else(|| format!("unknown kernel_type: {}", name))?;
            }
            "degree" => param.degree = parse_one(&mut parts, "degree")?,
            "gamma" => param.gamma = parse_one(&mut parts, "gamma")?,
            "coef0" => param.coef0 = parse_one(&mut parts, "coef0")?,
            "nr_class" => nr_class = parse_one(&mut parts, "nr_class")?,
            "total_sv" => total_sv = parse_one(&mut parts, "total_sv")?,
            "rho" => rho = parse_rest(parts, "rho")?,
            "label" => label = parse_rest(parts, "label")?,
            "probA" => prob_a = parse_rest(parts, "probA")?,
            "probB" => prob_b = parse_rest(parts, "probB")?,
            "nr_sv" => n_sv = parse_rest(parts, "nr_sv")?,
            "SV" => break,
            other => return Err(format!("unknown keyword: {}", other)),
        }
    }

    let coef_rows = if nr_class > 1 { nr_class - 1 } else { 1 };
    let mut sv_coef: Vec<Vec<f64>> = (0..coef_rows)
        .map(|_| Vec::with_capacity(total_sv))
        .collect();
    let mut sv: Vec<Vec<SvmNode>> = Vec::with_capacity(total_sv);

    while sv.len() < total_sv {
        let line = lines
            .next()
            .ok_or_else(|| "unexpected end of file in SV section".to_string())?
            .map_err(|e| e.to_string())?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let mut parts = line.split_whitespace();
        for coef_row in sv_coef.iter_mut() {
            let token = parts.next().ok_or("missing sv_coef value")?;
            let value: f64 = token
                .parse()
                .map_err(|_| format!("invalid sv_coef: {}", token))?;
            coef_row.push(value);
        }

        let mut nodes = Vec::new();
        for token in parts {
            let (idx, val) = token
                .split_once(':')
                .ok_or_else(|| format!("expected index:value, got: {}", token))?;
            let index: i32 = idx.parse().map_err(|_| format!("invalid index: {}", idx))?;
            let value: f64 = val.parse().map_err(|_| format!("invalid value: {}", val))?;
            nodes.push(SvmNode { index, value });
        }
        sv.push(nodes);
    }

    Ok(SvmModel {
        param,
        nr_class,
        sv,
        sv_coef,
        rho,
        prob_a,
        prob_b,
        sv_indices: Vec::new(), // not stored in the file format
        label,
        n_sv,
    })
}

fn parse_one<T: std::str::FromStr>(
    parts: &mut std::str::SplitWhitespace<'_>,
    field: &str,
) -> Result<T, String> {
    let token = parts
        .next()
        .ok_or_else(|| format!("missing {} value", field))?;
    token
        .parse()
        .map_err(|_| format!("invalid {} value: {}", field, token))
}

fn parse_rest<T: std::str::FromStr>(
    parts: std::str::SplitWhitespace<'_>,
    field: &str,
) -> Result<Vec<T>, String> {
    parts
        .map(|token| {
            token
                .parse()
                .map_err(|_| format!("invalid {} value: {}", field, token))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_model() -> SvmModel {
        SvmModel {
            param: SvmParameter {
                svm_type: SvmType::CSvc,
                kernel_type: KernelType::Rbf,
                gamma: 0.5,
                ..Default::default()
            },
            nr_class: 2,
            sv: vec![
                vec![
                    SvmNode { index: 1, value: 0.5 },
                    SvmNode { index: 3, value: -1.0 },
                ],
                vec![
                    SvmNode { index: 1, value: -0.25 },
                    SvmNode { index: 2, value: 0.75 },
                ],
            ],
            sv_coef: vec![vec![0.123456789012345, -0.987654321098765]],
            rho: vec![0.42446200000000001],
            prob_a: Vec::new(),
            prob_b: Vec::new(),
            sv_indices: Vec::new(),
            label: vec![1, -1],
            n_sv: vec![1, 1],
        }
    }

    #[test]
    fn test_gfmt_matches_c_printf() {
        // Reference strings from C's printf("%.17g|%.8g", v, v)
        let cases: &[(f64, &str, &str)] = &[
            (0.5, "0.5", "0.5"),
            (-1.0, "-1", "-1"),
            (0.123456789012345, "0.123456789012345", "0.12345679"),
            (-0.987654321098765, "-0.98765432109876505", "-0.98765432"),
            (0.42446200000000001, "0.42446200000000001", "0.424462"),
            (0.0, "0", "0"),
            (1e-5, "1.0000000000000001e-05", "1e-05"),
            (1e-4, "0.0001", "0.0001"),
            (1e20, "1e+20", "1e+20"),
            (-0.25, "-0.25", "-0.25"),
            (0.708333, "0.70833299999999999", "0.708333"),
            (1.0, "1", "1"),
        ];
        for &(v, want17, want8) in cases {
            assert_eq!(format!("{}", fmt_17g(v)), want17, "%.17g of {}", v);
            assert_eq!(format!("{}", fmt_8g(v)), want8, "%.8g of {}", v);
        }
    }

    #[test]
    fn test_header_layout() {
        let mut buf = Vec::new();
        write_model(&mut buf, &sample_model()).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "svm_type c_svc");
        assert_eq!(lines[1], "kernel_type rbf");
        assert_eq!(lines[2], "gamma 0.5");
        assert_eq!(lines[3], "nr_class 2");
        assert_eq!(lines[4], "total_sv 2");
        assert_eq!(lines[5], "rho 0.42446200000000001");
        assert_eq!(lines[6], "label 1 -1");
        assert_eq!(lines[7], "nr_sv 1 1");
        assert_eq!(lines[8], "SV");
        assert_eq!(lines[9], "0.123456789012345 1:0.5 3:-1 ");
        assert_eq!(lines[10], "-0.98765432109876505 1:-0.25 2:0.75 ");
    }

    #[test]
    fn test_roundtrip_through_text() {
        let model = sample_model();
        let mut buf = Vec::new();
        write_model(&mut buf, &model).unwrap();

        let loaded = read_model(&buf[..]).expect("model parses");
        assert_eq!(loaded.nr_class, model.nr_class);
        assert_eq!(loaded.param.svm_type, model.param.svm_type);
        assert_eq!(loaded.param.kernel_type, model.param.kernel_type);
        assert_eq!(loaded.param.gamma, model.param.gamma);
        assert_eq!(loaded.sv, model.sv);
        assert_eq!(loaded.label, model.label);
        assert_eq!(loaded.n_sv, model.n_sv);
        for (a, b) in loaded.rho.iter().zip(model.rho.iter()) {
            assert!((a - b).abs() < 1e-15);
        }
        for (row_a, row_b) in loaded.sv_coef.iter().zip(model.sv_coef.iter()) {
            for (a, b) in row_a.iter().zip(row_b.iter()) {
                assert!((a - b).abs() < 1e-15);
            }
        }
    }

    #[test]
    fn test_second_roundtrip_is_byte_identical() {
        // text → model → text must be stable once through the formatter
        let mut first = Vec::new();
        write_model(&mut first, &sample_model()).unwrap();
        let reloaded = read_model(&first[..]).unwrap();
        let mut second = Vec::new();
        write_model(&mut second, &reloaded).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_malformed_content_returns_none() {
        assert!(read_model(&b"svm_type martian\n"[..]).is_none());
        assert!(read_model(&b"bogus_keyword 1\n"[..]).is_none());
        assert!(read_model(&b"svm_type c_svc\n"[..]).is_none()); // truncated
        let bad_sv = b"svm_type c_svc\nkernel_type linear\nnr_class 2\ntotal_sv 1\nrho 0\nSV\nnot_a_number 1:x \n";
        assert!(read_model(&bad_sv[..]).is_none());
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        assert!(load_model(Path::new("/definitely/not/here.model")).is_none());
    }
}
