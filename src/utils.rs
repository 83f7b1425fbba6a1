use std::ops::RangeInclusive;

/// Parse `"a..b"` as `a..=b`
pub fn parse_range<T: std::str::FromStr>(s: &str) -> Result<RangeInclusive<T>, String>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    let v = s.split("..").collect::<Vec<_>>();
    if v.len() != 2 {
        return Err(format!("Could not find '..' when parsing range '{s}'"));
    }
    let x = v[0].trim().parse().map_err(|e| format!("{e}"))?;
    let y = v[1].trim().parse().map_err(|e| format!("{e}"))?;
    Ok(x..=y)
}

#[allow(clippy::many_single_char_names)]
pub fn parse_triplet<T: std::str::FromStr>(s: &str) -> Result<(T,T,T), String>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    let v = s.split(',').collect::<Vec<_>>();
    if v.len() != 3 {
        return Err(format!("Expected 3 comma-separated values, got '{s}'"));
    }
    let parse = |x: &str| x.trim().parse::<T>().map_err(|e| format!("{e}"));
    Ok((parse(v[0])?, parse(v[1])?, parse(v[2])?))
}

pub fn parse_pair<T: std::str::FromStr>(s: &str) -> Result<(T,T), String>
where
    <T as std::str::FromStr>::Err: std::fmt::Display,
{
    let v = s.split(',').collect::<Vec<_>>();
    if v.len() != 2 {
        return Err(format!("Expected 2 comma-separated values, got '{s}'"));
    }
    let parse = |x: &str| x.trim().parse::<T>().map_err(|e| format!("{e}"));
    Ok((parse(v[0])?, parse(v[1])?))
}

/// Group numeric digits to facilitate reading long numbers
pub fn group_digits<F: std::fmt::Display>(n: F) -> String {
    use numsep::{separate, Locale};
    separate(n, Locale::English)
}

/// Send `tracing` events to stderr, filtered by `RUST_LOG` (default `info`)
pub fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    // Fails only if a subscriber is already installed, which is fine
    let _ = fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub mod timing {

    use super::group_digits;
    use std::time::Instant;
    use std::io::Write;

    pub struct Progress {
        previous: Instant,
    }

    impl Progress {

        #[allow(clippy::new_without_default)]
        pub fn new() -> Self { Self { previous: Instant::now() } }

        /// Print message, append ellipsis, flush stdout, stay on same line, start timer.
        pub fn start(&mut self, message: &str) {
            print!("{message} ... ");
            let _ = std::io::stdout().flush();
            self.start_timer();
        }

        /// Print message, go to next line, start timer
        pub fn startln(&mut self, message: &str) {
            self.start(message);
            println!();
            self.start_timer();
        }

        // Print time elapsed since last start or done
        pub fn done(&mut self) {
            println!("{} ms", group_digits(self.previous.elapsed().as_millis()));
            self.start_timer();
        }

        // Print message followed by time elapsed since last start or done
        pub fn done_with_message(&mut self, message: &str) {
            println!("{message}: {} ms",
                     group_digits(self.previous.elapsed().as_millis()));
            self.start_timer();
        }

        fn start_timer(&mut self) { self.previous = Instant::now() }
    }
}

/// An indicatif bar counting projections
pub fn projection_bar(n: usize) -> indicatif::ProgressBar {
    let bar = indicatif::ProgressBar::new(n as u64);
    if let Ok(style) = indicatif::ProgressStyle::with_template(
        "[{elapsed_precise}] {wide_bar} {pos}/{len} projections ({eta} left)"
    ) {
        bar.set_style(style);
    }
    bar
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    #[allow(unused)] use pretty_assertions::{assert_eq, assert_ne};

    #[rstest(/**/ text         , expected,
             case("1,2,3"      , Ok((1.0, 2.0, 3.0))),
             case(" 4, -5 , 6" , Ok((4.0, -5.0, 6.0))),
    )]
    fn triplets(text: &str, expected: Result<(f64, f64, f64), String>) {
        assert_eq!(parse_triplet::<f64>(text), expected);
    }

    #[test]
    fn malformed_triplet() {
        assert!(parse_triplet::<f64>("1,2").is_err());
        assert!(parse_triplet::<f64>("1,x,3").is_err());
    }

    #[test]
    fn range_is_inclusive() {
        assert_eq!(parse_range::<f32>("0..2"), Ok(0.0..=2.0));
        assert!(parse_range::<f32>("0-2").is_err());
    }

    #[test]
    fn digits_grouped() {
        assert_eq!(group_digits(1234567), "1,234,567");
    }
}
