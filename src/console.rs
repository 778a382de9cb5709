//! Debug console.
//!
//! [`CommandReader`] turns UART bytes into [`ConsoleCommand`]s: most keys
//! act immediately, `p`, `C`, `L` and `g` start a numeric command whose
//! digits commit on CR / LF or once the line has been idle for
//! [`IDLE_COMMIT`]. [`Console`] applies commands to a [`DisplayEyes`]
//! through its public control surface only.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embassy_time::{Duration, Instant};
use embedded_graphics::pixelcolor::{Rgb565, RgbColor};
use heapless::Vec;

use crate::board::Board;
use crate::config::{EngineConfig, Gpio};
use crate::engine::DisplayEyes;
use crate::error::EyesError;
use crate::eyemodelz::GazeDirection;
use crate::framebuffer::{EyeSelect, FrameBuffer};
use crate::{EYE_DISPLAY_HEIGHT, EYE_DISPLAY_WIDTH};

/// A numeric command commits after this long without input.
pub const IDLE_COMMIT: Duration = Duration::from_millis(400);
/// Digits kept per numeric command; more are ignored.
pub const MAX_DIGITS: usize = 7;
/// Step for `+` / `-`.
pub const BRIGHTNESS_STEP: u8 = 10;

pub const HELP: &str = "h help | i pins | r re-init | R re-init + color bars | w wake | \
v invert | s solid color | q smoothing | t telemetry | k blink | a pause | m wander | \
0/1/b backlight off/on/toggle | +/- brightness | pNN percent | CNN right CS | \
LNN backlight pin | D right display | d bars on right | gN gaze 0-8";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConsoleCommand {
    Help,
    PinInfo,
    Reinit,
    /// Re-initialize, then show color bars and pause
    ReinitWithBars,
    Wake,
    ToggleInversion,
    CycleSolidColor,
    ToggleQuality,
    Telemetry,
    Blink,
    TogglePause,
    BacklightOff,
    BacklightOn,
    BacklightToggle,
    BrightnessUp,
    BrightnessDown,
    Brightness(u32),
    RightSelect(Gpio),
    BacklightPin(Gpio),
    ToggleRightDisplay,
    /// Color bars again, refused while the right panel is disabled
    RedrawRight,
    ToggleWander,
    Gaze(GazeDirection),
    Unknown(u8),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Prefix {
    Percent,
    RightSelect,
    BacklightPin,
    Gaze,
}

impl Prefix {
    fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            b'p' | b'P' => Some(Prefix::Percent),
            b'C' | b'c' => Some(Prefix::RightSelect),
            b'L' | b'l' => Some(Prefix::BacklightPin),
            b'g' | b'G' => Some(Prefix::Gaze),
            _ => None,
        }
    }
}

fn single_key(byte: u8) -> Option<ConsoleCommand> {
    use ConsoleCommand::*;
    Some(match byte {
        b'h' | b'?' => Help,
        b'i' => PinInfo,
        b'r' => Reinit,
        b'R' => ReinitWithBars,
        b'w' => Wake,
        b'v' => ToggleInversion,
        b's' => CycleSolidColor,
        b'q' => ToggleQuality,
        b't' => Telemetry,
        b'k' => Blink,
        b'a' => TogglePause,
        b'm' => ToggleWander,
        b'0' => BacklightOff,
        b'1' => BacklightOn,
        b'b' => BacklightToggle,
        b'+' | b'=' => BrightnessUp,
        b'-' | b'_' => BrightnessDown,
        b'D' => ToggleRightDisplay,
        b'd' => RedrawRight,
        b'\r' | b'\n' | b' ' => return None,
        other => Unknown(other),
    })
}

/// Accumulates console input. Time comes from the caller so the idle
/// deadline is explicit state rather than a loop counter.
#[derive(Debug, Default)]
pub struct CommandReader {
    prefix: Option<Prefix>,
    digits: Vec<u8, MAX_DIGITS>,
    last_rx: Option<Instant>,
}

impl CommandReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// When [`CommandReader::poll`] should be called next, if a numeric
    /// command is pending.
    pub fn deadline(&self) -> Option<Instant> {
        self.prefix.and(self.last_rx).map(|at| at + IDLE_COMMIT)
    }

    pub fn feed(&mut self, byte: u8, now: Instant) -> Option<ConsoleCommand> {
        if let Some(prefix) = self.prefix {
            match byte {
                b'0'..=b'9' => {
                    // extra digits are dropped, the command still commits
                    let _ = self.digits.push(byte - b'0');
                    self.last_rx = Some(now);
                    return None;
                }
                b'\r' | b'\n' => return self.commit(prefix),
                _ => {
                    debug!("console: dropped partial command");
                    self.clear();
                }
            }
        }

        if let Some(prefix) = Prefix::from_byte(byte) {
            self.prefix = Some(prefix);
            self.digits.clear();
            self.last_rx = Some(now);
            return None;
        }
        single_key(byte)
    }

    /// Commit a pending numeric command once the line has gone idle.
    pub fn poll(&mut self, now: Instant) -> Option<ConsoleCommand> {
        let prefix = self.prefix?;
        let deadline = self.deadline()?;
        if now < deadline {
            return None;
        }
        if self.digits.is_empty() {
            self.clear();
            return None;
        }
        self.commit(prefix)
    }

    fn clear(&mut self) {
        self.prefix = None;
        self.digits.clear();
        self.last_rx = None;
    }

    fn commit(&mut self, prefix: Prefix) -> Option<ConsoleCommand> {
        let value = self
            .digits
            .iter()
            .fold(0u32, |acc, d| acc * 10 + *d as u32);
        let had_digits = !self.digits.is_empty();
        self.clear();
        if !had_digits {
            return None;
        }
        let pin = || u8::try_from(value).ok().map(Gpio);
        let command = match prefix {
            Prefix::Percent => Some(ConsoleCommand::Brightness(value)),
            Prefix::RightSelect => pin().map(ConsoleCommand::RightSelect),
            Prefix::BacklightPin => pin().map(ConsoleCommand::BacklightPin),
            Prefix::Gaze => u8::try_from(value)
                .ok()
                .and_then(|v| GazeDirection::try_from(v).ok())
                .map(ConsoleCommand::Gaze),
        };
        if command.is_none() {
            warn!("console: value {} out of range", value);
        }
        command
    }
}

const SOLID_COLORS: [Rgb565; 5] = [
    Rgb565::RED,
    Rgb565::GREEN,
    Rgb565::BLUE,
    Rgb565::WHITE,
    Rgb565::BLACK,
];

/// Console side settings: the config used for re-initialization and the
/// backlight level that `1` / `b` restore.
pub struct Console<'a> {
    config: EngineConfig,
    bars: &'a FrameBuffer,
    backlight_on: bool,
    percent: u8,
    solid: usize,
    quality: bool,
    parked_right: Option<Gpio>,
}

impl<'a> Console<'a> {
    /// `pattern` is drawn over with color bars and kept for `R` / `d`.
    pub fn new(config: EngineConfig, pattern: &'a mut FrameBuffer) -> Self {
        pattern.draw_color_bars();
        Self {
            bars: pattern,
            backlight_on: config.backlight_percent > 0,
            percent: config.backlight_percent.min(100),
            solid: 0,
            quality: config.high_quality,
            parked_right: None,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub async fn execute<M: RawMutex, B: Board>(
        &mut self,
        eyes: &DisplayEyes<'_, M, B>,
        command: ConsoleCommand,
    ) -> Result<(), EyesError> {
        use ConsoleCommand::*;
        debug!("console: {}", command);
        match command {
            Help => info!("{=str}", HELP),
            PinInfo => {
                let pins = &self.config.pins;
                info!(
                    "MOSI {} SCLK {} DC {} RST {} BL {} CS_L {} CS_R {}",
                    pins.mosi,
                    pins.sclk,
                    pins.dc,
                    pins.rst,
                    pins.backlight,
                    pins.cs_left,
                    pins.cs_right
                );
                info!("mode {}, topology {}", eyes.mode(), eyes.topology());
            }
            Reinit => self.reinit(eyes).await?,
            ReinitWithBars => {
                self.reinit(eyes).await?;
                let right = self.config.pins.cs_right.is_some();
                self.show_bars(eyes, right).await?;
            }
            Wake => eyes.wake().await?,
            ToggleInversion => eyes.set_inversion(!eyes.inverted()).await?,
            CycleSolidColor => {
                let color = SOLID_COLORS[self.solid];
                self.solid = (self.solid + 1) % SOLID_COLORS.len();
                eyes.set_paused(true)?;
                eyes.fill_solid(color, EyeSelect::Both).await?;
            }
            ToggleQuality => {
                self.quality = !self.quality;
                eyes.set_high_quality(self.quality)?;
                info!("smoothing {}", self.quality);
            }
            Telemetry => {
                let perf = eyes.get_perf();
                info!(
                    "fps {} render {}us transfer {}us frames {}",
                    perf.fps,
                    perf.render_time_us,
                    perf.transfer_time_us,
                    perf.frames
                );
                match perf.free_memory {
                    0 => info!("free memory unknown"),
                    free => info!("free {} bytes", free),
                }
            }
            Blink => eyes.blink()?,
            TogglePause => eyes.set_paused(!eyes.mode().is_paused())?,
            ToggleWander => {
                let on = !eyes.gaze()?.wander;
                eyes.set_wander(on)?;
                info!("wander {}", on);
            }
            BacklightOff => self.set_backlight(eyes, false),
            BacklightOn => self.set_backlight(eyes, true),
            BacklightToggle => self.set_backlight(eyes, !self.backlight_on),
            BrightnessUp => {
                self.percent = self.percent.saturating_add(BRIGHTNESS_STEP).min(100);
                self.set_backlight(eyes, true);
            }
            BrightnessDown => {
                self.percent = self.percent.saturating_sub(BRIGHTNESS_STEP);
                self.set_backlight(eyes, true);
            }
            Brightness(percent) => {
                self.percent = percent.min(100) as u8;
                self.set_backlight(eyes, true);
            }
            RightSelect(gpio) => {
                self.config.pins.cs_right = Some(gpio);
                self.parked_right = None;
                self.reinit(eyes).await?;
            }
            BacklightPin(gpio) => {
                self.config.pins.backlight = Some(gpio);
                self.reinit(eyes).await?;
            }
            ToggleRightDisplay => {
                let pins = &mut self.config.pins;
                match pins.cs_right.take() {
                    Some(gpio) => self.parked_right = Some(gpio),
                    None => pins.cs_right = self.parked_right.take(),
                }
                self.reinit(eyes).await?;
            }
            RedrawRight => {
                if self.config.pins.cs_right.is_none() {
                    warn!("console: right display disabled");
                } else {
                    // a right frame needs a left one too, send the bars to both
                    self.show_bars(eyes, true).await?;
                }
            }
            Gaze(direction) => eyes.set_direction(direction)?,
            Unknown(byte) => warn!("console: unknown key {=u8:#x}, h for help", byte),
        }
        Ok(())
    }

    async fn show_bars<M: RawMutex, B: Board>(
        &self,
        eyes: &DisplayEyes<'_, M, B>,
        right: bool,
    ) -> Result<(), EyesError> {
        let frame = self.bars.pixels();
        // manual frames are refused while animating
        eyes.set_paused(true)?;
        eyes.submit_frame(
            frame,
            right.then_some(frame),
            EYE_DISPLAY_WIDTH,
            EYE_DISPLAY_HEIGHT,
        )
        .await
    }

    fn set_backlight<M: RawMutex, B: Board>(&mut self, eyes: &DisplayEyes<'_, M, B>, on: bool) {
        self.backlight_on = on;
        eyes.set_brightness(if on { self.percent as i32 } else { 0 });
    }

    /// Tear down and start again with the console's config, carrying over
    /// the live brightness, inversion and smoothing settings.
    async fn reinit<M: RawMutex, B: Board>(
        &mut self,
        eyes: &DisplayEyes<'_, M, B>,
    ) -> Result<(), EyesError> {
        self.config.backlight_percent = if self.backlight_on { self.percent } else { 0 };
        self.config.invert_colors = eyes.inverted();
        self.config.high_quality = self.quality;
        eyes.deinitialize().await;
        eyes.initialize(self.config).await?;
        info!("console: re-initialized");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PinRole, Topology};
    use crate::error::ConfigError;
    use crate::framebuffer::{Eye, FrameStore};
    use crate::mock::MockBoard;
    use crate::state::DisplayMode;
    use embassy_futures::block_on;
    use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

    fn at(ms: u64) -> Instant {
        Instant::from_millis(ms)
    }

    fn feed_all(reader: &mut CommandReader, bytes: &[u8], now: Instant) -> Option<ConsoleCommand> {
        let mut last = None;
        for &byte in bytes {
            last = reader.feed(byte, now);
        }
        last
    }

    #[test]
    fn single_keys_act_immediately() {
        let mut reader = CommandReader::new();
        assert_eq!(reader.feed(b'k', at(0)), Some(ConsoleCommand::Blink));
        assert_eq!(reader.feed(b'+', at(0)), Some(ConsoleCommand::BrightnessUp));
        assert_eq!(reader.feed(b'0', at(0)), Some(ConsoleCommand::BacklightOff));
        assert_eq!(reader.feed(b'D', at(0)), Some(ConsoleCommand::ToggleRightDisplay));
        assert_eq!(reader.feed(b'd', at(0)), Some(ConsoleCommand::RedrawRight));
        assert_eq!(reader.feed(b'r', at(0)), Some(ConsoleCommand::Reinit));
        assert_eq!(reader.feed(b'R', at(0)), Some(ConsoleCommand::ReinitWithBars));
        assert_eq!(reader.feed(b'm', at(0)), Some(ConsoleCommand::ToggleWander));
        assert_eq!(reader.feed(b'\n', at(0)), None);
        assert_eq!(reader.feed(b'x', at(0)), Some(ConsoleCommand::Unknown(b'x')));
        assert_eq!(reader.deadline(), None);
    }

    #[test]
    fn numeric_command_commits_on_newline() {
        let mut reader = CommandReader::new();
        assert_eq!(feed_all(&mut reader, b"p50", at(0)), None);
        assert_eq!(reader.feed(b'\r', at(5)), Some(ConsoleCommand::Brightness(50)));
        assert_eq!(
            feed_all(&mut reader, b"C21\n", at(10)),
            Some(ConsoleCommand::RightSelect(Gpio(21)))
        );
        assert_eq!(
            feed_all(&mut reader, b"g3\n", at(20)),
            Some(ConsoleCommand::Gaze(GazeDirection::West))
        );
    }

    #[test]
    fn digits_inside_a_command_are_not_keys() {
        // "p10" must not turn the backlight on and off
        let mut reader = CommandReader::new();
        assert_eq!(feed_all(&mut reader, b"p10", at(0)), None);
        assert_eq!(reader.poll(at(399)), None);
        assert_eq!(reader.poll(at(400)), Some(ConsoleCommand::Brightness(10)));
        assert_eq!(reader.poll(at(900)), None);
    }

    #[test]
    fn idle_deadline_moves_with_each_digit() {
        let mut reader = CommandReader::new();
        reader.feed(b'L', at(0));
        assert_eq!(reader.deadline(), Some(at(400)));
        reader.feed(b'1', at(300));
        assert_eq!(reader.deadline(), Some(at(700)));
        assert_eq!(reader.poll(at(500)), None);
        reader.feed(b'3', at(600));
        assert_eq!(reader.poll(at(1_000)), Some(ConsoleCommand::BacklightPin(Gpio(13))));
        assert_eq!(reader.deadline(), None);
    }

    #[test]
    fn prefix_without_digits_expires_silently() {
        let mut reader = CommandReader::new();
        reader.feed(b'p', at(0));
        assert_eq!(reader.poll(at(500)), None);
        assert_eq!(reader.deadline(), None);
        assert_eq!(reader.feed(b'\r', at(600)), None);
    }

    #[test]
    fn other_key_abandons_the_command() {
        let mut reader = CommandReader::new();
        reader.feed(b'p', at(0));
        reader.feed(b'5', at(0));
        assert_eq!(reader.feed(b'k', at(10)), Some(ConsoleCommand::Blink));
        assert_eq!(reader.deadline(), None);
        // and a new prefix restarts it
        feed_all(&mut reader, b"p7g", at(20));
        assert_eq!(reader.feed(b'8', at(30)), None);
        assert_eq!(
            reader.feed(b'\n', at(40)),
            Some(ConsoleCommand::Gaze(GazeDirection::SouthEast))
        );
    }

    #[test]
    fn long_and_out_of_range_values() {
        let mut reader = CommandReader::new();
        assert_eq!(
            feed_all(&mut reader, b"p123456789\r", at(0)),
            Some(ConsoleCommand::Brightness(1_234_567))
        );
        assert_eq!(feed_all(&mut reader, b"g9\r", at(0)), None);
        assert_eq!(feed_all(&mut reader, b"C300\r", at(0)), None);
    }

    type Eyes<'a> = DisplayEyes<'a, CriticalSectionRawMutex, MockBoard>;

    fn run(console: &mut Console<'_>, eyes: &Eyes<'_>, command: ConsoleCommand) -> Result<(), EyesError> {
        block_on(console.execute(eyes, command))
    }

    #[test]
    fn brightness_commands() {
        let mut store = FrameStore::new();
        let board = MockBoard::new();
        let eyes: Eyes<'_> = DisplayEyes::new(board.clone(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        run(&mut console, &eyes, ConsoleCommand::BrightnessUp).unwrap();
        assert_eq!(eyes.brightness(), 100);
        run(&mut console, &eyes, ConsoleCommand::BrightnessDown).unwrap();
        assert_eq!(eyes.brightness(), 90);
        run(&mut console, &eyes, ConsoleCommand::Brightness(40)).unwrap();
        assert_eq!(board.backlight_duty(), 40);
        run(&mut console, &eyes, ConsoleCommand::BacklightOff).unwrap();
        assert_eq!(eyes.brightness(), 0);
        run(&mut console, &eyes, ConsoleCommand::BacklightToggle).unwrap();
        assert_eq!(eyes.brightness(), 40);
        run(&mut console, &eyes, ConsoleCommand::Brightness(250)).unwrap();
        assert_eq!(eyes.brightness(), 100);
    }

    #[test]
    fn solid_colors_pause_and_fill() {
        let mut store = FrameStore::new();
        let eyes: Eyes<'_> = DisplayEyes::new(MockBoard::new(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        run(&mut console, &eyes, ConsoleCommand::CycleSolidColor).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::Paused);
        let first = |fb: &crate::FrameBuffer| fb.pixel(0, 0).unwrap();
        assert_eq!(block_on(eyes.committed_frame(Eye::Left, first)), Rgb565::RED);
        run(&mut console, &eyes, ConsoleCommand::CycleSolidColor).unwrap();
        assert_eq!(block_on(eyes.committed_frame(Eye::Right, first)), Rgb565::GREEN);

        run(&mut console, &eyes, ConsoleCommand::TogglePause).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::Animating);
        run(&mut console, &eyes, ConsoleCommand::TogglePause).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::Paused);
    }

    #[test]
    fn pin_changes_reinitialize() {
        let mut store = FrameStore::new();
        let eyes: Eyes<'_> = DisplayEyes::new(MockBoard::new(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        let left = config.pins.cs_left.unwrap();
        run(&mut console, &eyes, ConsoleCommand::RightSelect(left)).unwrap();
        assert_eq!(eyes.topology(), Some(Topology::Mirrored));

        run(&mut console, &eyes, ConsoleCommand::ToggleRightDisplay).unwrap();
        assert_eq!(eyes.topology(), Some(Topology::Single));
        run(&mut console, &eyes, ConsoleCommand::ToggleRightDisplay).unwrap();
        assert_eq!(eyes.topology(), Some(Topology::Mirrored));

        run(&mut console, &eyes, ConsoleCommand::RightSelect(Gpio(21))).unwrap();
        assert_eq!(eyes.topology(), Some(Topology::Dual));
        run(&mut console, &eyes, ConsoleCommand::Reinit).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::Animating);
    }

    #[test]
    fn bad_backlight_pin_leaves_engine_down() {
        let mut store = FrameStore::new();
        let eyes: Eyes<'_> = DisplayEyes::new(MockBoard::new(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        let dc = config.pins.dc.unwrap();
        assert_eq!(
            run(&mut console, &eyes, ConsoleCommand::BacklightPin(dc)),
            Err(EyesError::Config(ConfigError::DuplicatePin {
                first: PinRole::DataCommand,
                second: PinRole::Backlight,
                gpio: dc,
            }))
        );
        assert_eq!(eyes.mode(), DisplayMode::Uninitialized);
        assert_eq!(console.config().pins.backlight, Some(dc));
    }

    #[test]
    fn settings_survive_reinit() {
        let mut store = FrameStore::new();
        let eyes: Eyes<'_> = DisplayEyes::new(MockBoard::new(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        run(&mut console, &eyes, ConsoleCommand::Brightness(30)).unwrap();
        run(&mut console, &eyes, ConsoleCommand::ToggleInversion).unwrap();
        run(&mut console, &eyes, ConsoleCommand::ToggleQuality).unwrap();
        run(&mut console, &eyes, ConsoleCommand::Reinit).unwrap();

        assert_eq!(eyes.brightness(), 30);
        assert!(eyes.inverted());
        assert!(eyes.gaze().unwrap().high_quality);
        run(&mut console, &eyes, ConsoleCommand::Gaze(GazeDirection::North)).unwrap();
        assert_eq!(eyes.gaze().unwrap().direction, GazeDirection::North);
    }

    #[test]
    fn bars_pause_and_reach_both_panels() {
        let mut store = FrameStore::new();
        let board = MockBoard::new();
        let eyes: Eyes<'_> = DisplayEyes::new(board.clone(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);
        let first = |fb: &FrameBuffer| fb.pixel(0, 0).unwrap();
        let last = |fb: &FrameBuffer| fb.pixel(EYE_DISPLAY_WIDTH - 1, 0).unwrap();

        board.log().clear();
        run(&mut console, &eyes, ConsoleCommand::ReinitWithBars).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::ManualImage);
        assert_eq!(block_on(eyes.committed_frame(Eye::Left, first)), Rgb565::WHITE);
        assert_eq!(block_on(eyes.committed_frame(Eye::Right, last)), Rgb565::BLACK);
        let log = board.log();
        assert_eq!(log.frames_to(config.pins.cs_left.unwrap()), 1);
        assert_eq!(log.frames_to(config.pins.cs_right.unwrap()), 1);
        drop(log);

        // right only redraw after something else was shown
        block_on(eyes.fill_solid(Rgb565::RED, EyeSelect::Right)).unwrap();
        run(&mut console, &eyes, ConsoleCommand::RedrawRight).unwrap();
        assert_eq!(block_on(eyes.committed_frame(Eye::Right, first)), Rgb565::WHITE);
        assert_eq!(eyes.mode(), DisplayMode::ManualImage);
    }

    #[test]
    fn right_redraw_needs_the_right_panel() {
        let mut store = FrameStore::new();
        let board = MockBoard::new();
        let eyes: Eyes<'_> = DisplayEyes::new(board.clone(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        run(&mut console, &eyes, ConsoleCommand::ToggleRightDisplay).unwrap();
        assert_eq!(eyes.topology(), Some(Topology::Single));
        board.log().clear();
        run(&mut console, &eyes, ConsoleCommand::RedrawRight).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::Animating);
        assert_eq!(board.log().frames(), 0);

        // bars still go to the left panel alone
        run(&mut console, &eyes, ConsoleCommand::ReinitWithBars).unwrap();
        assert_eq!(eyes.mode(), DisplayMode::ManualImage);
        assert_eq!(board.log().frames_to(config.pins.cs_left.unwrap()), 1);
    }

    #[test]
    fn wander_toggles() {
        let mut store = FrameStore::new();
        let eyes: Eyes<'_> = DisplayEyes::new(MockBoard::new(), &mut store);
        let config = EngineConfig::default();
        block_on(eyes.initialize(config)).unwrap();
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(config, &mut bars);

        run(&mut console, &eyes, ConsoleCommand::ToggleWander).unwrap();
        assert!(eyes.gaze().unwrap().wander);
        run(&mut console, &eyes, ConsoleCommand::ToggleWander).unwrap();
        assert!(!eyes.gaze().unwrap().wander);
    }

    #[test]
    fn telemetry_without_a_memory_estimate() {
        let mut store = FrameStore::new();
        let eyes: Eyes<'_> = DisplayEyes::new(MockBoard::new(), &mut store);
        let mut bars = FrameBuffer::new();
        let mut console = Console::new(EngineConfig::default(), &mut bars);

        // nothing published yet, free memory reads as unknown
        assert_eq!(eyes.get_perf().free_memory, 0);
        assert_eq!(run(&mut console, &eyes, ConsoleCommand::Telemetry), Ok(()));
    }
}
