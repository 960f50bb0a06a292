use crate::time_provider::WallClock;
use crate::weather::WeatherReport;

/// Live values substituted into face text.
pub trait DataProvider {
    fn wall_clock(&self) -> &WallClock;
    fn weather(&self) -> &WeatherReport;
    /// Formatted active timer, empty when there is none.
    fn timer_text(&self) -> String;
}

/// Replaces every recognised `{token}` in one left-to-right pass.
///
/// Unknown tokens and unmatched braces are copied through unchanged.
pub fn render(template: &str, provider: &dyn DataProvider) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let after = &rest[open + 1..];
        let value = after
            .find('}')
            .and_then(|close| token_value(&after[..close], provider).map(|value| (close, value)));
        match value {
            Some((close, value)) => {
                out.push_str(&value);
                rest = &after[close + 1..];
            }
            None => {
                out.push('{');
                rest = after;
            }
        }
    }
    out.push_str(rest);
    out
}

fn token_value(token: &str, provider: &dyn DataProvider) -> Option<String> {
    let clock = provider.wall_clock();
    let weather = provider.weather();
    let value = match token {
        "hour" => clock.hour12.to_string(),
        "minute" => format!("{:02}", clock.minute),
        "second" => format!("{:02}", clock.second),
        "hour24" => clock.hour24.to_string(),
        "ampm" => (if clock.hour24 < 12 { "am" } else { "pm" }).to_string(),
        "temp" => weather.temp.to_string(),
        "temp_feel" => weather.feels_like.to_string(),
        "humidity" => weather.humidity.to_string(),
        "wind_speed" => truncate_one_decimal(weather.wind_speed),
        "forecast" => weather.forecast.clone(),
        "forecast_short" => weather.forecast_short.clone(),
        "day_forecast" => weather.day_forecast.clone(),
        "day_low" => weather.day_low.to_string(),
        "day_high" => weather.day_high.to_string(),
        "date_format" => clock.formatted_date.clone(),
        "month_name" => clock.month_name.to_string(),
        "day_name" => clock.day_name.to_string(),
        "month_num" => clock.month_num.to_string(),
        "month_day" => clock.day_of_month.to_string(),
        "week_day_num" => clock.day_of_week.to_string(),
        "year" => clock.year.to_string(),
        "timer" => provider.timer_text(),
        _ => return None,
    };
    Some(value)
}

/// Keeps exactly one digit after the decimal point, cutting rather than rounding.
fn truncate_one_decimal(value: f64) -> String {
    let full = format!("{value:.6}");
    match full.find('.') {
        Some(dot) => full[..dot + 2].to_string(),
        None => full,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) struct FixedData {
        pub clock: WallClock,
        pub weather: WeatherReport,
        pub timer: String,
    }

    impl FixedData {
        pub(crate) fn at(hour24: u32, minute: u32, second: u32) -> Self {
            let hour12 = match hour24 % 12 {
                0 => 12,
                hour => hour,
            };
            Self {
                clock: WallClock {
                    hour12,
                    minute,
                    second,
                    hour24,
                    day_of_week: 3,
                    day_of_month: 18,
                    month_num: 11,
                    month_name: "November",
                    day_name: "Wednesday",
                    year: 2026,
                    formatted_date: "11-18-2026".to_string(),
                },
                weather: WeatherReport::default(),
                timer: String::new(),
            }
        }
    }

    impl DataProvider for FixedData {
        fn wall_clock(&self) -> &WallClock {
            &self.clock
        }

        fn weather(&self) -> &WeatherReport {
            &self.weather
        }

        fn timer_text(&self) -> String {
            self.timer.clone()
        }
    }

    #[test]
    fn renders_twelve_hour_time_with_suffix() {
        let data = FixedData::at(15, 5, 9);
        assert_eq!(render("{hour}:{minute}{ampm}", &data), "3:05pm");
        assert_eq!(render("{hour24}:{minute}:{second}", &data), "15:05:09");
        assert_eq!(render("{ampm}", &FixedData::at(0, 0, 0)), "am");
    }

    #[test]
    fn wind_speed_keeps_one_decimal() {
        let mut data = FixedData::at(9, 0, 0);
        data.weather.wind_speed = 7.0;
        assert_eq!(render("{wind_speed}", &data), "7.0");
        data.weather.wind_speed = 12.96;
        assert_eq!(render("{wind_speed}mph", &data), "12.9mph");
    }

    #[test]
    fn pre_poll_weather_renders_placeholders() {
        let data = FixedData::at(9, 0, 0);
        assert_eq!(
            render("{forecast}|{forecast_short}|{temp}|{humidity}", &data),
            "N/A|~Error~|0|0"
        );
    }

    #[test]
    fn date_tokens_are_verbatim() {
        let data = FixedData::at(9, 0, 0);
        assert_eq!(
            render("{day_name} {month_name} {month_day}, {year} ({date_format}) {week_day_num}/{month_num}", &data),
            "Wednesday November 18, 2026 (11-18-2026) 3/11"
        );
    }

    #[test]
    fn unknown_tokens_and_stray_braces_pass_through() {
        let mut data = FixedData::at(9, 30, 0);
        data.timer = "4:59".to_string();
        assert_eq!(render("{bogus} {minute}", &data), "{bogus} 30");
        assert_eq!(render("{{minute}", &data), "{30");
        assert_eq!(render("left { open", &data), "left { open");
        assert_eq!(render("{timer}{timer}", &data), "4:594:59");
    }
}
