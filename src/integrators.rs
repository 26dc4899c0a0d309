//! Time integrators over flat state vectors.
//!
//! [`Dopri8`] is the workhorse: an adaptive Dormand-Prince method of
//! order 8 with an embedded 5th/3rd-order error estimate and automatic
//! step-size control (the classic DOP853 scheme of Hairer, Nørsett &
//! Wanner). The fixed-step functions exist for cross-checking and for
//! callers that want a deterministic cost per frame.

use log::{debug, warn};
use na::SVector;

use crate::{
    error::{Result, SimError},
    types::Float,
};

// Node coefficients.
const C2: Float = 0.526001519587677318785587544488e-1;
const C3: Float = 0.789002279381515978178381316732e-1;
const C4: Float = 0.118350341907227396726757197510;
const C5: Float = 0.281649658092772603273242802490;
const C6: Float = 1.0 / 3.0;
const C7: Float = 0.25;
const C8: Float = 0.307692307692307692307692307692;
const C9: Float = 0.651282051282051282051282051282;
const C10: Float = 0.6;
const C11: Float = 0.857142857142857142857142857142;

// Stage coefficients.
const A21: Float = 5.26001519587677318785587544488e-2;
const A31: Float = 1.97250569845378994544595329183e-2;
const A32: Float = 5.91751709536136983633785987549e-2;
const A41: Float = 2.95875854768068491816892993775e-2;
const A43: Float = 8.87627564304205475450678981324e-2;
const A51: Float = 2.41365134159266685502369798665e-1;
const A53: Float = -8.84549479328286085344864962717e-1;
const A54: Float = 9.24834003261792003115737966543e-1;
const A61: Float = 3.7037037037037037037037037037e-2;
const A64: Float = 1.70828608729473871279604482173e-1;
const A65: Float = 1.25467687566822425016691814123e-1;
const A71: Float = 3.7109375e-2;
const A74: Float = 1.70252211019544039314978060272e-1;
const A75: Float = 6.02165389804559606850219397283e-2;
const A76: Float = -1.7578125e-2;
const A81: Float = 3.70920001185047927108779319836e-2;
const A84: Float = 1.70383925712239993810214054705e-1;
const A85: Float = 1.07262030446373284651809199168e-1;
const A86: Float = -1.53194377486244017527936158236e-2;
const A87: Float = 8.27378916381402288758473766002e-3;
const A91: Float = 6.24110958716075717114429577812e-1;
const A94: Float = -3.36089262944694129406857109825;
const A95: Float = -8.68219346841726006818189891453e-1;
const A96: Float = 2.75920996994467083049415600797e1;
const A97: Float = 2.01540675504778934086186788979e1;
const A98: Float = -4.34898841810699588477366255144e1;
const A101: Float = 4.77662536438264365890433908527e-1;
const A104: Float = -2.48811461997166764192642586468;
const A105: Float = -5.90290826836842996371446475743e-1;
const A106: Float = 2.12300514481811942347288949897e1;
const A107: Float = 1.52792336328824235832596922938e1;
const A108: Float = -3.32882109689848629194453265587e1;
const A109: Float = -2.03312017085086261358222928593e-2;
const A111: Float = -9.3714243008598732571704021658e-1;
const A114: Float = 5.18637242884406370830023853209;
const A115: Float = 1.09143734899672957818500254654;
const A116: Float = -8.14978701074692612513997267357;
const A117: Float = -1.85200656599969598641566180701e1;
const A118: Float = 2.27394870993505042818970056734e1;
const A119: Float = 2.49360555267965238987089396762;
const A1110: Float = -3.04676447189821950038236690220;
const A121: Float = 2.27331014751653820792359768449;
const A124: Float = -1.05344954667372501984066689879e1;
const A125: Float = -2.00087205822486249909675718444;
const A126: Float = -1.79589318631187989172765950534e1;
const A127: Float = 2.79488845294199600508499808837e1;
const A128: Float = -2.85899827713502369474065508674;
const A129: Float = -8.87285693353062954433549289258;
const A1210: Float = 1.23605671757943030647266201528e1;
const A1211: Float = 6.43392746015763530355970484046e-1;

// 8th-order solution weights.
const B1: Float = 5.42937341165687622380535766363e-2;
const B6: Float = 4.45031289275240888144113950566;
const B7: Float = 1.89151789931450038304281599044;
const B8: Float = -5.8012039600105847814672114227;
const B9: Float = 3.11164366957819894408916062370e-1;
const B10: Float = -1.52160949662516078556178806805e-1;
const B11: Float = 2.01365400804030348374776537501e-1;
const B12: Float = 4.47106157277725905176885569043e-2;

// 3rd-order error weights.
const BHH1: Float = 0.244094488188976377952755905512;
const BHH2: Float = 0.733846688281611857341361741547;
const BHH3: Float = 0.220588235294117647058823529412e-1;

// 5th-order error weights.
const ER1: Float = 0.1312004499419488073250102996e-1;
const ER6: Float = -0.1225156446376204440720569753e1;
const ER7: Float = -0.4957589496572501915214079952;
const ER8: Float = 0.1664377182454986536961530415e1;
const ER9: Float = -0.3503288487499736816886487290;
const ER10: Float = 0.3341791187130174790297318841;
const ER11: Float = 0.8192320648511571246570742613e-1;
const ER12: Float = -0.2235530786388629525884427845e-1;

// Step-size controller.
const SAFE: Float = 0.9;
const FAC1: Float = 0.333;
const FAC2: Float = 6.0;
const FACC1: Float = 1.0 / FAC1;
const FACC2: Float = 1.0 / FAC2;
const BETA: Float = 0.0;
const EXPO1: Float = 1.0 / 8.0 - BETA * 0.2;

/// Adaptive Dormand-Prince 8(5,3) integration context.
///
/// One context belongs to exactly one integration sequence: the
/// accepted step size is carried across [`Dopri8::integrate`] calls as
/// a warm start, so a context must never be shared between bodies.
/// After a discontinuous state change, call [`Dopri8::reset`] so the
/// next call selects a fresh step size.
#[derive(Clone, Debug)]
pub struct Dopri8 {
    pub rtol: Float,
    pub atol: Float,
    /// Budget of internal substeps (accepted or rejected) per call.
    pub max_steps: usize,
    h: Option<Float>,
    facold: Float,
}

impl Default for Dopri8 {
    fn default() -> Self {
        Dopri8::new()
    }
}

impl Dopri8 {
    pub fn new() -> Self {
        Dopri8 {
            rtol: 1e-7,
            atol: 1e-9,
            max_steps: 100_000,
            h: None,
            facold: 1e-4,
        }
    }

    pub fn with_tolerances(mut self, rtol: Float, atol: Float) -> Self {
        self.rtol = rtol;
        self.atol = atol;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    /// Drop the warm-started step size, e.g. after the integrated
    /// state was changed discontinuously.
    pub fn reset(&mut self) {
        self.h = None;
        self.facold = 1e-4;
    }

    /// Integrate y' = f(t, y) from (t0, y0) forward to t_end.
    ///
    /// Returns the state at exactly t_end, or [`SimError::IntegrationFailure`]
    /// if the step-size control cannot satisfy the tolerance within the
    /// substep budget.
    pub fn integrate<const N: usize, F>(
        &mut self,
        f: F,
        t0: Float,
        y0: &SVector<Float, N>,
        t_end: Float,
    ) -> Result<SVector<Float, N>>
    where
        F: Fn(Float, &SVector<Float, N>) -> SVector<Float, N>,
    {
        if t_end < t0 {
            return Err(SimError::invalid_parameter(format!(
                "integration target {t_end} is before start time {t0}"
            )));
        }
        if t_end == t0 {
            return Ok(*y0);
        }

        let hmax = t_end - t0;
        let mut t = t0;
        let mut y = *y0;
        let mut k1 = f(t, &y);
        let mut h = match self.h {
            Some(h) if h > 0.0 => h.min(hmax),
            _ => self.initial_step(&f, t, &y, &k1, hmax),
        };
        let mut facold = self.facold;
        let mut hnew = h;
        let mut reject = false;
        let mut nstep = 0usize;

        while t < t_end {
            nstep += 1;
            if nstep > self.max_steps {
                warn!("substep budget {} exhausted at t = {t}", self.max_steps);
                self.reset();
                return Err(SimError::IntegrationFailure {
                    time: t,
                    steps: nstep - 1,
                });
            }
            if 0.1 * h.abs() <= t.abs() * Float::EPSILON {
                warn!("step size underflow at t = {t}, h = {h}");
                self.reset();
                return Err(SimError::IntegrationFailure {
                    time: t,
                    steps: nstep - 1,
                });
            }

            let mut last = false;
            if t + 1.01 * h >= t_end {
                h = t_end - t;
                last = true;
            }

            let k2 = f(t + C2 * h, &(y + k1 * (A21 * h)));
            let k3 = f(t + C3 * h, &(y + (k1 * A31 + k2 * A32) * h));
            let k4 = f(t + C4 * h, &(y + (k1 * A41 + k3 * A43) * h));
            let k5 = f(t + C5 * h, &(y + (k1 * A51 + k3 * A53 + k4 * A54) * h));
            let k6 = f(t + C6 * h, &(y + (k1 * A61 + k4 * A64 + k5 * A65) * h));
            let k7 = f(
                t + C7 * h,
                &(y + (k1 * A71 + k4 * A74 + k5 * A75 + k6 * A76) * h),
            );
            let k8 = f(
                t + C8 * h,
                &(y + (k1 * A81 + k4 * A84 + k5 * A85 + k6 * A86 + k7 * A87) * h),
            );
            let k9 = f(
                t + C9 * h,
                &(y + (k1 * A91 + k4 * A94 + k5 * A95 + k6 * A96 + k7 * A97 + k8 * A98) * h),
            );
            let k10 = f(
                t + C10 * h,
                &(y + (k1 * A101
                    + k4 * A104
                    + k5 * A105
                    + k6 * A106
                    + k7 * A107
                    + k8 * A108
                    + k9 * A109)
                    * h),
            );
            let k11 = f(
                t + C11 * h,
                &(y + (k1 * A111
                    + k4 * A114
                    + k5 * A115
                    + k6 * A116
                    + k7 * A117
                    + k8 * A118
                    + k9 * A119
                    + k10 * A1110)
                    * h),
            );
            let k12 = f(
                t + h,
                &(y + (k1 * A121
                    + k4 * A124
                    + k5 * A125
                    + k6 * A126
                    + k7 * A127
                    + k8 * A128
                    + k9 * A129
                    + k10 * A1210
                    + k11 * A1211)
                    * h),
            );

            let dy = k1 * B1
                + k6 * B6
                + k7 * B7
                + k8 * B8
                + k9 * B9
                + k10 * B10
                + k11 * B11
                + k12 * B12;
            let y1 = y + dy * h;

            // Embedded 5th/3rd-order error estimate.
            let mut err5 = 0.0;
            let mut err3 = 0.0;
            for i in 0..N {
                let sk = self.atol + self.rtol * y[i].abs().max(y1[i].abs());
                let e3 = dy[i] - BHH1 * k1[i] - BHH2 * k9[i] - BHH3 * k12[i];
                err3 += (e3 / sk) * (e3 / sk);
                let e5 = ER1 * k1[i]
                    + ER6 * k6[i]
                    + ER7 * k7[i]
                    + ER8 * k8[i]
                    + ER9 * k9[i]
                    + ER10 * k10[i]
                    + ER11 * k11[i]
                    + ER12 * k12[i];
                err5 += (e5 / sk) * (e5 / sk);
            }
            let mut deno = err5 + 0.01 * err3;
            if deno <= 0.0 {
                deno = 1.0;
            }
            let err = h.abs() * err5 * (1.0 / (deno * N as Float)).sqrt();

            if !err.is_finite() {
                debug!("non-finite error estimate at t = {t}, halving h = {h}");
                h *= 0.5;
                reject = true;
                continue;
            }

            let fac11 = err.powf(EXPO1);
            let fac = (fac11 / facold.powf(BETA) / SAFE).clamp(FACC2, FACC1);
            hnew = h / fac;

            if err <= 1.0 {
                facold = err.max(1e-4);
                t += h;
                y = y1;
                if reject {
                    hnew = hnew.min(h);
                }
                reject = false;
                if last {
                    t = t_end;
                } else {
                    hnew = hnew.min(hmax);
                    k1 = f(t, &y);
                }
                h = hnew;
            } else {
                debug!("step rejected at t = {t}, h = {h}, err = {err}");
                hnew = h / (fac11 / SAFE).min(FACC1);
                reject = true;
                h = hnew;
            }
        }

        self.h = Some(hnew);
        self.facold = facold;
        Ok(y)
    }

    /// Step-size guess for the first step, from the magnitudes of the
    /// state, its derivative, and a crude second-derivative probe.
    fn initial_step<const N: usize, F>(
        &self,
        f: &F,
        t0: Float,
        y0: &SVector<Float, N>,
        f0: &SVector<Float, N>,
        hmax: Float,
    ) -> Float
    where
        F: Fn(Float, &SVector<Float, N>) -> SVector<Float, N>,
    {
        let mut dnf = 0.0;
        let mut dny = 0.0;
        for i in 0..N {
            let sk = self.atol + self.rtol * y0[i].abs();
            dnf += (f0[i] / sk) * (f0[i] / sk);
            dny += (y0[i] / sk) * (y0[i] / sk);
        }
        let mut h = if dnf <= 1e-10 || dny <= 1e-10 {
            1e-6
        } else {
            (dny / dnf).sqrt() * 0.01
        };
        h = h.min(hmax);

        // Explicit Euler probe for the second derivative.
        let y1 = y0 + f0 * h;
        let f1 = f(t0 + h, &y1);
        let mut der2 = 0.0;
        for i in 0..N {
            let sk = self.atol + self.rtol * y0[i].abs();
            der2 += ((f1[i] - f0[i]) / sk) * ((f1[i] - f0[i]) / sk);
        }
        let der2 = der2.sqrt() / h;

        let der12 = der2.max(dnf.sqrt());
        let h1 = if der12 <= 1e-15 {
            (h.abs() * 1e-3).max(1e-6)
        } else {
            (0.01 / der12).powf(1.0 / 8.0)
        };
        (100.0 * h).min(h1).min(hmax)
    }
}

/// One explicit Euler step: y(t + dt) = y + dt * f(t, y).
pub fn explicit_euler<const N: usize, F>(
    f: &F,
    t: Float,
    y: &SVector<Float, N>,
    dt: Float,
) -> SVector<Float, N>
where
    F: Fn(Float, &SVector<Float, N>) -> SVector<Float, N>,
{
    y + f(t, y) * dt
}

/// One classical Runge-Kutta 4 step.
pub fn runge_kutta_4<const N: usize, F>(
    f: &F,
    t: Float,
    y: &SVector<Float, N>,
    dt: Float,
) -> SVector<Float, N>
where
    F: Fn(Float, &SVector<Float, N>) -> SVector<Float, N>,
{
    let f1 = f(t, y);
    let f2 = f(t + dt / 2.0, &(y + f1 * (dt / 2.0)));
    let f3 = f(t + dt / 2.0, &(y + f2 * (dt / 2.0)));
    let f4 = f(t + dt, &(y + f3 * dt));

    let f_final = (f1 + f2 * 2.0 + f3 * 2.0 + f4) / 6.0;
    y + f_final * dt
}
