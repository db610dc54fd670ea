//! Seeded Mersenne Twister random number generator
//!
//! Every random draw in the crate (fold partitions, bootstrap samples, feature
//! bagging, permutation importance) comes from an explicitly seeded
//! [`MersenneTwister`]. There is no global random state: callers derive one
//! stream per independent unit of work with [`derive_seed`], so results do not
//! depend on how work is scheduled across threads.

/// MT19937 random number generator
pub struct MersenneTwister {
    state: [u32; 624],
    index: usize,
}

impl MersenneTwister {
    const N: usize = 624;
    const M: usize = 397;
    const MATRIX_A: u32 = 0x9908B0DF;
    const UPPER_MASK: u32 = 0x80000000;
    const LOWER_MASK: u32 = 0x7FFFFFFF;

    /// Create a generator from a 64-bit seed
    pub fn new(seed: u64) -> Self {
        let mut mt = MersenneTwister {
            state: [0; Self::N],
            index: Self::N,
        };
        mt.init_genrand(fold_seed(seed));
        mt
    }

    /// Standard MT initialization (Matsumoto & Nishimura init_genrand)
    fn init_genrand(&mut self, seed: u32) {
        self.state[0] = seed;
        for i in 1..Self::N {
            let prev = self.state[i - 1];
            self.state[i] = (1812433253_u32)
                .wrapping_mul(prev ^ (prev >> 30))
                .wrapping_add(i as u32);
        }
        self.index = Self::N;
    }

    /// Generate the next 624 words of the state array
    fn generate_numbers(&mut self) {
        for i in 0..Self::N {
            let y = (self.state[i] & Self::UPPER_MASK)
                | (self.state[(i + 1) % Self::N] & Self::LOWER_MASK);
            self.state[i] = self.state[(i + Self::M) % Self::N] ^ (y >> 1);
            if y & 1 != 0 {
                self.state[i] ^= Self::MATRIX_A;
            }
        }
        self.index = 0;
    }

    /// Generate a random 32-bit integer
    pub fn next_u32(&mut self) -> u32 {
        if self.index >= Self::N {
            self.generate_numbers();
        }

        let mut y = self.state[self.index];
        self.index += 1;

        // Tempering transformation
        y ^= y >> 11;
        y ^= (y << 7) & 0x9D2C5680;
        y ^= (y << 15) & 0xEFC60000;
        y ^= y >> 18;

        y
    }

    /// Uniform random number in the open interval (0, 1)
    pub fn runif(&mut self) -> f64 {
        let u = self.next_u32();
        let mut result = u as f64 * 2.3283064365386963e-10;

        // Keep strictly inside (0, 1) so inversion sampling never hits ±inf
        if result <= 0.0 {
            result = 0.5 * 2.3283064365386963e-10;
        }
        if result >= 1.0 {
            result = 1.0 - 0.5 * 2.3283064365386963e-10;
        }
        result
    }

    /// Standard normal draw by inversion of the normal CDF
    pub fn rnorm(&mut self) -> f64 {
        let u = self.runif();
        qnorm(u)
    }

    /// Uniform index in `0..bound` without modulo bias (rejection sampling)
    pub fn unif_index(&mut self, bound: usize) -> usize {
        debug_assert!(bound > 0 && bound <= u32::MAX as usize);
        let bound = bound as u32;
        // Largest multiple of `bound` that fits in u32
        let zone = u32::MAX - (u32::MAX % bound);
        loop {
            let v = self.next_u32();
            if v < zone {
                return (v % bound) as usize;
            }
        }
    }

    /// In-place Fisher-Yates shuffle
    pub fn shuffle<T>(&mut self, data: &mut [T]) {
        let n = data.len();
        for i in (1..n).rev() {
            let j = self.unif_index(i + 1);
            data.swap(i, j);
        }
    }

    /// Draw `n` indices from `0..population` with replacement (bootstrap)
    pub fn sample_with_replacement(&mut self, population: usize, n: usize) -> Vec<usize> {
        (0..n).map(|_| self.unif_index(population)).collect()
    }

    /// Draw `k` distinct indices from `0..population`, in draw order
    pub fn sample_without_replacement(&mut self, population: usize, k: usize) -> Vec<usize> {
        let k = k.min(population);
        let mut pool: Vec<usize> = (0..population).collect();
        // Partial Fisher-Yates: only the first k positions are needed
        for i in 0..k {
            let j = i + self.unif_index(population - i);
            pool.swap(i, j);
        }
        pool.truncate(k);
        pool
    }
}

/// Fold a 64-bit seed into the 32-bit MT seed space
fn fold_seed(seed: u64) -> u32 {
    let mixed = splitmix64(seed);
    (mixed ^ (mixed >> 32)) as u32
}

/// SplitMix64 finalizer
fn splitmix64(x: u64) -> u64 {
    let mut z = x.wrapping_add(0x9E3779B97F4A7C15);
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Derive an independent seed for a sub-stream identified by `path`
///
/// `derive_seed(seed, &[repeat, fold])` gives the same value regardless of the
/// order in which units are evaluated.
pub fn derive_seed(seed: u64, path: &[u64]) -> u64 {
    path.iter()
        .fold(splitmix64(seed), |acc, &p| splitmix64(acc ^ splitmix64(p.wrapping_add(1))))
}

/// Inverse normal CDF (quantile function)
///
/// Wichura's Algorithm AS 241 (~10^-16 precision).
fn qnorm(p: f64) -> f64 {
    if p <= 0.0 {
        return f64::NEG_INFINITY;
    }
    if p >= 1.0 {
        return f64::INFINITY;
    }
    if p.is_nan() {
        return f64::NAN;
    }

    // Horner's method for polynomial evaluation
    fn horner(coeffs: &[f64], x: f64) -> f64 {
        let mut result = coeffs[coeffs.len() - 1];
        for i in (0..coeffs.len() - 1).rev() {
            result = result * x + coeffs[i];
        }
        result
    }

    // Central region coefficients (|p - 0.5| <= 0.425)
    const A: [f64; 8] = [
        3.3871328727963666080e0,
        1.3314166789178437745e2,
        1.9715909503065514427e3,
        1.3731693765509461125e4,
        4.5921953931549871457e4,
        6.7265770927008700853e4,
        3.3430575583588128105e4,
        2.5090809287301226727e3,
    ];
    const B: [f64; 8] = [
        1.0,
        4.2313330701600911252e1,
        6.8718700749205790830e2,
        5.3941960214247511077e3,
        2.1213794301586595867e4,
        3.9307895800092710610e4,
        2.8729085735721942674e4,
        5.2264952788528545610e3,
    ];

    // Intermediate region coefficients
    const C: [f64; 8] = [
        1.42343711074968357734e0,
        4.63033784615654529590e0,
        5.76949722146069140550e0,
        3.64784832476320460504e0,
        1.27045825245236838258e0,
        2.41780725177450611770e-1,
        2.27238260553211220900e-2,
        7.74545014427727025900e-4,
    ];
    const D: [f64; 8] = [
        1.0,
        2.05319162663775882187e0,
        1.67638483018380162246e0,
        6.89767334985100004550e-1,
        1.48103976427480074590e-1,
        1.51986665636164571966e-2,
        5.47593808499534494600e-4,
        1.05075007164441684324e-9,
    ];

    // Tail region coefficients
    const E: [f64; 8] = [
        6.65790464350110377720e0,
        5.46378491116411436990e0,
        1.78482653991729133580e0,
        2.96560571828504891230e-1,
        2.65321895265761230930e-2,
        1.24266094738807843860e-3,
        2.71155556874348757815e-5,
        2.01033439929228813265e-7,
    ];
    const F: [f64; 8] = [
        1.0,
        5.99832206555887937690e-1,
        1.36929880922735805310e-1,
        1.48753612908506508198e-2,
        7.86869131145613259100e-4,
        1.84631831751005468180e-5,
        1.42151175831644588870e-7,
        2.04426310338993978564e-15,
    ];

    let q = p - 0.5;

    if q.abs() <= 0.425 {
        let r = 0.180625 - q * q;
        q * horner(&A, r) / horner(&B, r)
    } else {
        let r = if q < 0.0 { p } else { 1.0 - p };
        let r = (-r.ln()).sqrt();

        let val = if r <= 5.0 {
            let r = r - 1.6;
            horner(&C, r) / horner(&D, r)
        } else {
            let r = r - 5.0;
            horner(&E, r) / horner(&F, r)
        };

        if q < 0.0 { -val } else { val }
    }
}
