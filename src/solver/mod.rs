//! SVM solver
//!
//! The training, cross-validation and inference engine behind the dense
//! bridge. The bridge only touches the entry points exposed here —
//! [`train`], [`cross_validation::cross_validate`], [`check_parameter`],
//! [`predict`] and [`io`] — and treats everything below them as a black
//! box with the reference solver's semantics.

pub mod cross_validation;
pub mod io;
pub mod predict;
pub mod probability;
pub mod qmatrix;
pub mod smo;

use std::sync::RwLock;

use crate::core::{SvmModel, SvmNode, SvmParameter, SvmProblem, SvmType};
use crate::solver::qmatrix::{OneClassQ, SvcQ, SvrQ};
use crate::solver::smo::{solve, Solution, Variant};

// ─── Diagnostic output sink ─────────────────────────────────────────

/// Sink for the solver's diagnostic text output.
pub type PrintFn = fn(&str);

fn print_stderr(msg: &str) {
    eprint!("{}", msg);
}

static PRINT_SINK: RwLock<PrintFn> = RwLock::new(print_stderr);

/// Install the diagnostic output sink. Process-wide; installing the same
/// sink again is a no-op in effect, so callers re-install before every
/// call that can produce output.
pub fn set_print_fn(f: PrintFn) {
    *PRINT_SINK.write().expect("print sink lock poisoned") = f;
}

pub(crate) fn info(msg: &str) {
    let sink = *PRINT_SINK.read().expect("print sink lock poisoned");
    sink(msg);
}

// ─── Shared helpers ─────────────────────────────────────────────────

/// Linear congruential generator used for fold shuffling, matching the
/// deterministic behavior of the reference solver's `rand()` usage.
pub(crate) fn rng_next(state: &mut u64) -> usize {
    *state = state
        .wrapping_mul(6364136223846793005)
        .wrapping_add(1442695040888963407);
    (*state >> 33) as usize
}

/// Training labels grouped into contiguous class blocks.
pub(crate) struct GroupedClasses {
    pub label: Vec<i32>,
    pub start: Vec<usize>,
    pub count: Vec<usize>,
    pub perm: Vec<usize>,
}

impl GroupedClasses {
    pub(crate) fn nr_class(&self) -> usize {
        self.label.len()
    }
}

/// Group samples by class label, preserving first-seen order except for
/// the binary {-1, +1} case which is canonicalized to {+1, -1}.
pub(crate) fn group_classes(labels: &[f64]) -> GroupedClasses {
    let l = labels.len();
    let mut label_list: Vec<i32> = Vec::new();
    let mut count: Vec<usize> = Vec::new();
    let mut data_label = vec![0usize; l];

    for (i, &y) in labels.iter().enumerate() {
        let this_label = y as i32;
        if let Some(pos) = label_list.iter().position(|&lab| lab == this_label) {
            count[pos] += 1;
            data_label[i] = pos;
        } else {
            data_label[i] = label_list.len();
            label_list.push(this_label);
            count.push(1);
        }
    }

    let nr_class = label_list.len();
    if nr_class == 2 && label_list[0] == -1 && label_list[1] == 1 {
        label_list.swap(0, 1);
        count.swap(0, 1);
        for dl in data_label.iter_mut() {
            *dl ^= 1;
        }
    }

    let mut start = vec![0usize; nr_class];
    for i in 1..nr_class {
        start[i] = start[i - 1] + count[i - 1];
    }

    let mut perm = vec![0usize; l];
    let mut cursor = start.clone();
    for (i, &cls) in data_label.iter().enumerate() {
        perm[cursor[cls]] = i;
        cursor[cls] += 1;
    }

    GroupedClasses {
        label: label_list,
        start,
        count,
        perm,
    }
}

// ─── Parameter check ────────────────────────────────────────────────

/// Validate a parameter set against a problem.
///
/// The error value is the rejection reason, phrased exactly as the
/// reference solver phrases it; the caller is expected to surface it
/// verbatim.
pub fn check_parameter(problem: &SvmProblem, param: &SvmParameter) -> Result<(), String> {
    if param.kernel_type.uses_gamma() && param.gamma < 0.0 {
        return Err("gamma < 0".into());
    }
    if param.kernel_type == crate::core::KernelType::Polynomial && param.degree < 0 {
        return Err("degree of polynomial kernel < 0".into());
    }
    if param.cache_size <= 0.0 {
        return Err("cache_size <= 0".into());
    }
    if param.eps <= 0.0 {
        return Err("eps <= 0".into());
    }
    if matches!(
        param.svm_type,
        SvmType::CSvc | SvmType::EpsilonSvr | SvmType::NuSvr
    ) && param.c <= 0.0
    {
        return Err("C <= 0".into());
    }
    if matches!(
        param.svm_type,
        SvmType::NuSvc | SvmType::OneClass | SvmType::NuSvr
    ) && (param.nu <= 0.0 || param.nu > 1.0)
    {
        return Err("nu <= 0 or nu > 1".into());
    }
    if param.svm_type == SvmType::EpsilonSvr && param.p < 0.0 {
        return Err("p < 0".into());
    }
    if param.svm_type == SvmType::OneClass && param.probability {
        return Err("one-class SVM probability output not supported yet".into());
    }

    // ν-SVC feasibility: for every class pair, nu·(n1+n2)/2 <= min(n1, n2)
    if param.svm_type == SvmType::NuSvc {
        let grouped = group_classes(&problem.labels);
        for (i, &n1) in grouped.count.iter().enumerate() {
            for &n2 in &grouped.count[i + 1..] {
                if param.nu * (n1 + n2) as f64 / 2.0 > n1.min(n2) as f64 {
                    return Err("specified nu is infeasible".into());
                }
            }
        }
    }

    Ok(())
}

// ─── Single dual solves per formulation ─────────────────────────────

struct DecisionFn {
    alpha: Vec<f64>,
    rho: f64,
}

fn solve_c_svc(
    x: &[Vec<SvmNode>],
    labels: &[f64],
    param: &SvmParameter,
    cp: f64,
    cn: f64,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let y: Vec<i8> = labels.iter().map(|&v| if v > 0.0 { 1 } else { -1 }).collect();
    let p = vec![-1.0; l];
    let mut alpha = vec![0.0; l];

    let mut q = SvcQ::new(x, param, &y);
    let sol = solve(
        Variant::Standard,
        &mut q,
        &p,
        &y,
        &mut alpha,
        cp,
        cn,
        param.eps,
    );

    for i in 0..l {
        alpha[i] *= y[i] as f64;
    }
    (alpha, sol)
}

fn solve_nu_svc(x: &[Vec<SvmNode>], labels: &[f64], param: &SvmParameter) -> (Vec<f64>, Solution) {
    let l = x.len();
    let y: Vec<i8> = labels.iter().map(|&v| if v > 0.0 { 1 } else { -1 }).collect();

    // Spread nu·l/2 of initial mass over each sign group
    let mut alpha = vec![0.0; l];
    let mut sum_pos = param.nu * l as f64 / 2.0;
    let mut sum_neg = sum_pos;
    for i in 0..l {
        if y[i] == 1 {
            alpha[i] = f64::min(1.0, sum_pos);
            sum_pos -= alpha[i];
        } else {
            alpha[i] = f64::min(1.0, sum_neg);
            sum_neg -= alpha[i];
        }
    }

    let p = vec![0.0; l];
    let mut q = SvcQ::new(x, param, &y);
    let mut sol = solve(Variant::Nu, &mut q, &p, &y, &mut alpha, 1.0, 1.0, param.eps);

    let r = sol.r;
    for i in 0..l {
        alpha[i] *= y[i] as f64 / r;
    }
    sol.rho /= r;
    sol.obj /= r * r;
    sol.upper_bound_p = 1.0 / r;
    sol.upper_bound_n = 1.0 / r;

    (alpha, sol)
}

fn solve_one_class(x: &[Vec<SvmNode>], param: &SvmParameter) -> (Vec<f64>, Solution) {
    let l = x.len();
    let n = (param.nu * l as f64) as usize;

    let mut alpha = vec![0.0; l];
    for a in alpha.iter_mut().take(n.min(l)) {
        *a = 1.0;
    }
    if n < l {
        alpha[n] = param.nu * l as f64 - n as f64;
    }

    let p = vec![0.0; l];
    let y = vec![1i8; l];
    let mut q = OneClassQ::new(x, param);
    let sol = solve(
        Variant::Standard,
        &mut q,
        &p,
        &y,
        &mut alpha,
        1.0,
        1.0,
        param.eps,
    );
    (alpha, sol)
}

fn solve_epsilon_svr(
    x: &[Vec<SvmNode>],
    targets: &[f64],
    param: &SvmParameter,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear = vec![0.0; 2 * l];
    let mut y = vec![0i8; 2 * l];

    for i in 0..l {
        linear[i] = param.p - targets[i];
        y[i] = 1;
        linear[i + l] = param.p + targets[i];
        y[i + l] = -1;
    }

    let mut q = SvrQ::new(x, param);
    let sol = solve(
        Variant::Standard,
        &mut q,
        &linear,
        &y,
        &mut alpha2,
        param.c,
        param.c,
        param.eps,
    );

    let alpha = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    (alpha, sol)
}

fn solve_nu_svr(
    x: &[Vec<SvmNode>],
    targets: &[f64],
    param: &SvmParameter,
) -> (Vec<f64>, Solution) {
    let l = x.len();
    let c = param.c;
    let mut alpha2 = vec![0.0; 2 * l];
    let mut linear = vec![0.0; 2 * l];
    let mut y = vec![0i8; 2 * l];

    let mut sum = c * param.nu * l as f64 / 2.0;
    for i in 0..l {
        let a = f64::min(sum, c);
        alpha2[i] = a;
        alpha2[i + l] = a;
        sum -= a;

        linear[i] = -targets[i];
        y[i] = 1;
        linear[i + l] = targets[i];
        y[i + l] = -1;
    }

    let mut q = SvrQ::new(x, param);
    let sol = solve(
        Variant::Nu,
        &mut q,
        &linear,
        &y,
        &mut alpha2,
        c,
        c,
        param.eps,
    );

    let alpha = (0..l).map(|i| alpha2[i] - alpha2[i + l]).collect();
    (alpha, sol)
}

fn train_one(
    x: &[Vec<SvmNode>],
    labels: &[f64],
    param: &SvmParameter,
    cp: f64,
    cn: f64,
) -> DecisionFn {
    let (alpha, sol) = match param.svm_type {
        SvmType::CSvc => solve_c_svc(x, labels, param, cp, cn),
        SvmType::NuSvc => solve_nu_svc(x, labels, param),
        SvmType::OneClass => solve_one_class(x, param),
        SvmType::EpsilonSvr => solve_epsilon_svr(x, labels, param),
        SvmType::NuSvr => solve_nu_svr(x, labels, param),
    };

    info(&format!("obj = {}, rho = {}\n", sol.obj, sol.rho));

    let n_sv = alpha.iter().filter(|a| a.abs() > 0.0).count();
    let n_bsv = alpha
        .iter()
        .enumerate()
        .filter(|&(i, a)| {
            a.abs() > 0.0
                && if labels.get(i).copied().unwrap_or(1.0) > 0.0 {
                    a.abs() >= sol.upper_bound_p
                } else {
                    a.abs() >= sol.upper_bound_n
                }
        })
        .count();
    info(&format!("nSV = {}, nBSV = {}\n", n_sv, n_bsv));

    DecisionFn {
        alpha,
        rho: sol.rho,
    }
}

// ─── Training pipeline ──────────────────────────────────────────────

/// Train an SVM model.
///
/// The parameter set is assumed to have passed [`check_parameter`].
/// A `gamma` of zero is resolved to `1/max_feature_index` here, so the
/// returned model carries the effective value.
pub fn train(problem: &SvmProblem, param: &SvmParameter) -> SvmModel {
    let mut param = param.clone();
    if param.gamma == 0.0 {
        let max_index = problem
            .instances
            .iter()
            .flat_map(|inst| inst.iter())
            .map(|n| n.index)
            .max()
            .unwrap_or(0);
        if max_index > 0 {
            param.gamma = 1.0 / max_index as f64;
        }
    }

    match param.svm_type {
        SvmType::OneClass | SvmType::EpsilonSvr | SvmType::NuSvr => {
            train_single_machine(problem, &param)
        }
        SvmType::CSvc | SvmType::NuSvc => train_classifier(problem, &param),
    }
}

/// One-class and regression models: a single dual solve, one coefficient
/// row, no class bookkeeping.
fn train_single_machine(problem: &SvmProblem, param: &SvmParameter) -> SvmModel {
    let f = train_one(&problem.instances, &problem.labels, param, 0.0, 0.0);

    let mut sv = Vec::new();
    let mut coef = Vec::new();
    let mut sv_indices = Vec::new();
    for (i, instance) in problem.instances.iter().enumerate() {
        if f.alpha[i].abs() > 0.0 {
            sv.push(instance.clone());
            coef.push(f.alpha[i]);
            sv_indices.push(i + 1);
        }
    }

    let mut model = SvmModel {
        param: param.clone(),
        nr_class: 2,
        sv,
        sv_coef: vec![coef],
        rho: vec![f.rho],
        prob_a: Vec::new(),
        prob_b: Vec::new(),
        sv_indices,
        label: Vec::new(),
        n_sv: Vec::new(),
    };

    if param.probability
        && matches!(param.svm_type, SvmType::EpsilonSvr | SvmType::NuSvr)
    {
        model.prob_a = vec![probability::svr_laplace_scale(problem, param)];
    }

    model
}

/// Classification: one-vs-one training over every class pair, then
/// assembly of the shared support-vector list and coefficient matrix.
fn train_classifier(problem: &SvmProblem, param: &SvmParameter) -> SvmModel {
    let l = problem.len();
    let grouped = group_classes(&problem.labels);
    let nr_class = grouped.nr_class();

    if nr_class == 1 {
        info("WARNING: training data in only one class.\n");
    }

    let x: Vec<&Vec<SvmNode>> = grouped
        .perm
        .iter()
        .map(|&i| &problem.instances[i])
        .collect();

    // Per-class C with caller-supplied weight overrides
    let mut weighted_c = vec![param.c; nr_class];
    for &(wlabel, wval) in &param.weight {
        match grouped.label.iter().position(|&lab| lab == wlabel) {
            Some(j) => weighted_c[j] *= wval,
            None => info(&format!(
                "WARNING: class label {} specified in weight is not found\n",
                wlabel
            )),
        }
    }

    let n_pairs = nr_class * (nr_class - 1) / 2;
    let mut nonzero = vec![false; l];
    let mut decisions = Vec::with_capacity(n_pairs);
    let mut prob_a = Vec::new();
    let mut prob_b = Vec::new();

    for i in 0..nr_class {
        for j in (i + 1)..nr_class {
            let (si, sj) = (grouped.start[i], grouped.start[j]);
            let (ci, cj) = (grouped.count[i], grouped.count[j]);

            let mut sub_x = Vec::with_capacity(ci + cj);
            let mut sub_labels = Vec::with_capacity(ci + cj);
            for k in 0..ci {
                sub_x.push(x[si + k].clone());
                sub_labels.push(1.0);
            }
            for k in 0..cj {
                sub_x.push(x[sj + k].clone());
                sub_labels.push(-1.0);
            }

            if param.probability {
                let sub_prob = SvmProblem {
                    labels: sub_labels.clone(),
                    instances: sub_x.clone(),
                };
                let (pa, pb) = probability::binary_calibration(
                    &sub_prob,
                    param,
                    weighted_c[i],
                    weighted_c[j],
                );
                prob_a.push(pa);
                prob_b.push(pb);
            }

            let f = train_one(&sub_x, &sub_labels, param, weighted_c[i], weighted_c[j]);

            for k in 0..ci {
                if !nonzero[si + k] && f.alpha[k].abs() > 0.0 {
                    nonzero[si + k] = true;
                }
            }
            for k in 0..cj {
                if !nonzero[sj + k] && f.alpha[ci + k].abs() > 0.0 {
                    nonzero[sj + k] = true;
                }
            }
            decisions.push(f);
        }
    }

    let rho: Vec<f64> = decisions.iter().map(|d| d.rho).collect();

    let mut total_sv = 0;
    let mut n_sv_per_class = vec![0usize; nr_class];
    for i in 0..nr_class {
        let n = (0..grouped.count[i])
            .filter(|&j| nonzero[grouped.start[i] + j])
            .count();
        n_sv_per_class[i] = n;
        total_sv += n;
    }
    info(&format!("Total nSV = {}\n", total_sv));

    let mut sv = Vec::with_capacity(total_sv);
    let mut sv_indices = Vec::with_capacity(total_sv);
    for i in 0..l {
        if nonzero[i] {
            sv.push(x[i].clone());
            sv_indices.push(grouped.perm[i] + 1);
        }
    }

    // Start offset of each class's support vectors in the shared list
    let mut nz_start = vec![0usize; nr_class];
    for i in 1..nr_class {
        nz_start[i] = nz_start[i - 1] + n_sv_per_class[i - 1];
    }

    let mut sv_coef = vec![vec![0.0; total_sv]; nr_class.saturating_sub(1)];
    let mut p = 0;
    for i in 0..nr_class {
        for j in (i + 1)..nr_class {
            let (si, sj) = (grouped.start[i], grouped.start[j]);
            let (ci, cj) = (grouped.count[i], grouped.count[j]);

            let mut q = nz_start[i];
            for k in 0..ci {
                if nonzero[si + k] {
                    sv_coef[j - 1][q] = decisions[p].alpha[k];
                    q += 1;
                }
            }
            q = nz_start[j];
            for k in 0..cj {
                if nonzero[sj + k] {
                    sv_coef[i][q] = decisions[p].alpha[ci + k];
                    q += 1;
                }
            }
            p += 1;
        }
    }

    SvmModel {
        param: param.clone(),
        nr_class,
        sv,
        sv_coef,
        rho,
        prob_a,
        prob_b,
        sv_indices,
        label: grouped.label,
        n_sv: n_sv_per_class,
    }
}
