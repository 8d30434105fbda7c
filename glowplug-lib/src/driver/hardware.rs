//! Host-side lifecycle handle around one driver instance.

use std::fmt::{Display, Formatter};

use log::{debug, info};

use super::{Descriptor, Driver};
use crate::chain::{ChainView, PixelFormat};
use crate::error::{DriverError, Result};
use crate::param::{Param, ParamValue};
use crate::property::PropertyBook;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    /// `init` succeeded; no transport is open.
    Loaded,
    HardwareReady,
    /// The transport was closed again; `hw_init` may be retried.
    HardwareClosed,
}

impl Display for LifecycleState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LifecycleState::Loaded => "loaded",
            LifecycleState::HardwareReady => "ready",
            LifecycleState::HardwareClosed => "closed",
        };
        write!(f, "{}", name)
    }
}

/// One loaded driver instance together with the properties it registered.
///
/// Dropping a `Hardware` closes the transport if it is open and then
/// deinitializes the driver.
pub struct Hardware {
    name: String,
    descriptor: Descriptor,
    driver: Box<dyn Driver>,
    properties: PropertyBook,
    state: LifecycleState,
    format: Option<PixelFormat>,
}

impl Hardware {
    /// Instantiates the backend and runs its `init`.
    pub fn load(name: &str, descriptor: &Descriptor) -> Result<Self> {
        let mut driver = descriptor.instantiate();
        let mut properties = PropertyBook::new();
        driver.init(&mut properties)?;
        info!(
            "Loaded hardware \"{}\" ({} {})",
            name, descriptor.family, descriptor.version
        );
        Ok(Hardware {
            name: name.to_string(),
            descriptor: *descriptor,
            driver,
            properties,
            state: LifecycleState::Loaded,
            format: None,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Properties the driver registered in `init`.
    pub fn properties(&self) -> &PropertyBook {
        &self.properties
    }

    /// The pixel format bound at `hw_init`, while the transport is open.
    pub fn format(&self) -> Option<&PixelFormat> {
        self.format.as_ref()
    }

    pub fn hw_init(&mut self, id: &str, format: &PixelFormat) -> Result<()> {
        if self.state == LifecycleState::HardwareReady {
            return Err(DriverError::validation(format!(
                "hardware \"{}\" is already initialized",
                self.name
            )));
        }
        self.driver.hw_init(id, format)?;
        self.state = LifecycleState::HardwareReady;
        self.format = Some(format.clone());
        debug!("Hardware \"{}\" ready ({})", self.name, format);
        Ok(())
    }

    pub fn hw_deinit(&mut self) {
        if self.state != LifecycleState::HardwareReady {
            return;
        }
        self.driver.hw_deinit();
        self.state = LifecycleState::HardwareClosed;
        self.format = None;
        debug!("Hardware \"{}\" closed", self.name);
    }

    pub fn get(&self, param: &Param) -> Result<ParamValue> {
        self.driver.get(param)
    }

    pub fn set(&mut self, param: &Param, value: ParamValue) -> Result<()> {
        self.driver.set(param, value)
    }

    pub fn send(&mut self, chain: &ChainView<'_>, count: usize, offset: usize) -> Result<()> {
        let format = self.ready_format("send")?;
        if chain.format() != format {
            return Err(DriverError::unsupported_format(
                chain.format(),
                format!("hardware was initialized for {}", format),
            ));
        }
        self.driver.send(chain, count, offset)
    }

    pub fn show(&mut self) -> Result<()> {
        self.ready_format("show")?;
        self.driver.show()
    }

    fn ready_format(&self, operation: &'static str) -> Result<&PixelFormat> {
        match (&self.state, &self.format) {
            (LifecycleState::HardwareReady, Some(format)) => Ok(format),
            _ => Err(DriverError::NotReady(operation)),
        }
    }
}

impl Drop for Hardware {
    fn drop(&mut self) {
        self.hw_deinit();
        self.driver.deinit(&mut self.properties);
        debug!("Unloaded hardware \"{}\"", self.name);
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::driver::{Version, API_VERSION};
    use crate::property::{PropertyRegistry, PropertyType};

    thread_local! {
        static CALLS: Arc<Mutex<Vec<String>>> = Arc::default();
    }

    fn calls() -> Vec<String> {
        CALLS.with(|c| c.lock().unwrap().clone())
    }

    struct Recorder {
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn record(&self, call: &str) {
            self.log.lock().unwrap().push(call.to_string());
        }
    }

    impl Driver for Recorder {
        fn init(&mut self, registry: &mut dyn PropertyRegistry) -> Result<()> {
            self.record("init");
            registry.register("probe", PropertyType::Int)
        }

        fn deinit(&mut self, registry: &mut dyn PropertyRegistry) {
            self.record("deinit");
            registry.unregister("probe");
        }

        fn hw_init(&mut self, id: &str, _format: &PixelFormat) -> Result<()> {
            self.record("hw_init");
            if id == "missing" {
                return Err(DriverError::DeviceNotFound(id.to_string()));
            }
            Ok(())
        }

        fn hw_deinit(&mut self) {
            self.record("hw_deinit");
        }

        fn get(&self, _param: &Param) -> Result<ParamValue> {
            Ok(ParamValue::LedCount(0))
        }

        fn set(&mut self, _param: &Param, _value: ParamValue) -> Result<()> {
            Ok(())
        }

        fn send(&mut self, _chain: &ChainView<'_>, _count: usize, _offset: usize) -> Result<()> {
            self.record("send");
            Ok(())
        }

        fn show(&mut self) -> Result<()> {
            self.record("show");
            Ok(())
        }
    }

    const RECORDER: Descriptor = Descriptor {
        family: "recorder",
        version: Version::new(1, 0, 0),
        api_version: API_VERSION,
        license: "MIT",
        author: "",
        description: "records lifecycle calls",
        url: "",
        id_example: "anything",
        create: create_recorder,
    };

    fn create_recorder() -> Box<dyn Driver> {
        Box::new(Recorder {
            log: CALLS.with(|c| c.clone()),
        })
    }

    fn rgb() -> PixelFormat {
        "RGB u8".parse().unwrap()
    }

    #[test]
    fn test_send_and_show_require_ready() {
        let format = rgb();
        let buffer = [0u8; 3];
        let chain = ChainView::new(&buffer, 3, &format).unwrap();

        let mut hw = Hardware::load("test", &RECORDER).unwrap();
        assert_eq!(hw.state(), LifecycleState::Loaded);
        assert!(matches!(hw.send(&chain, 3, 0), Err(DriverError::NotReady(_))));
        assert!(matches!(hw.show(), Err(DriverError::NotReady(_))));

        hw.hw_init("*", &format).unwrap();
        hw.send(&chain, 3, 0).unwrap();
        hw.show().unwrap();

        hw.hw_deinit();
        assert_eq!(hw.state(), LifecycleState::HardwareClosed);
        assert!(matches!(hw.send(&chain, 3, 0), Err(DriverError::NotReady(_))));
        assert!(matches!(hw.show(), Err(DriverError::NotReady(_))));

        drop(hw);
        assert_eq!(
            calls(),
            vec!["init", "hw_init", "send", "show", "hw_deinit", "deinit"]
        );
    }

    #[test]
    fn test_drop_closes_then_deinits() {
        let hw = {
            let mut hw = Hardware::load("test", &RECORDER).unwrap();
            hw.hw_init("*", &rgb()).unwrap();
            assert!(hw.properties().contains("probe"));
            hw
        };
        drop(hw);
        assert_eq!(calls(), vec!["init", "hw_init", "hw_deinit", "deinit"]);
    }

    #[test]
    fn test_failed_hw_init_keeps_state() {
        let mut hw = Hardware::load("test", &RECORDER).unwrap();
        let result = hw.hw_init("missing", &rgb());
        assert!(matches!(result, Err(DriverError::DeviceNotFound(_))));
        assert_eq!(hw.state(), LifecycleState::Loaded);
        assert!(hw.format().is_none());

        // retry after the failure
        hw.hw_init("*", &rgb()).unwrap();
        assert_eq!(hw.state(), LifecycleState::HardwareReady);
        assert!(hw.hw_init("*", &rgb()).is_err());
    }

    #[test]
    fn test_send_checks_bound_format() {
        let mut hw = Hardware::load("test", &RECORDER).unwrap();
        hw.hw_init("*", &rgb()).unwrap();

        let other: PixelFormat = "Y u8".parse().unwrap();
        let buffer = [0u8; 2];
        let chain = ChainView::new(&buffer, 2, &other).unwrap();
        assert!(matches!(
            hw.send(&chain, 2, 0),
            Err(DriverError::FormatUnsupported { .. })
        ));
    }
}
