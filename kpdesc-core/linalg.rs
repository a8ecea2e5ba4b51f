//! Small dense solvers used by sub-pixel refinement.

/// Solves `a * x = b` for a 3x3 system by Cramer's rule. Returns zeros when
/// `a` is singular.
pub fn solve3(a: [[f64; 3]; 3], b: [f64; 3]) -> [f64; 3] {
    let det = |m: [[f64; 3]; 3]| {
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1]) - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    };
    let d = det(a);
    if d.abs() < f64::EPSILON {
        return [0.0; 3];
    }
    let mut x = [0.0; 3];
    for (k, xk) in x.iter_mut().enumerate() {
        let mut m = a;
        for (row, &bk) in m.iter_mut().zip(b.iter()) {
            row[k] = bk;
        }
        *xk = det(m) / d;
    }
    x
}
