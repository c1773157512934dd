//! Simulated element used by the command line runner.

use animation_conformance_core::host::AnimationTarget;
use animation_conformance_core::{AnimationClock, PropertyUnderTest, Result, Value, ValueKind};

const TYPE_NAME: &str = "DemoPanel";

/// A panel whose properties behave like a well-mannered toolkit element,
/// optionally with one property that serves a cached value.
#[derive(Debug, Default)]
pub struct DemoElement {
    stale_read: bool,
}

impl DemoElement {
    pub fn new(stale_read: bool) -> Self {
        Self { stale_read }
    }

    fn property(name: &str, kind: ValueKind) -> PropertyUnderTest {
        PropertyUnderTest::new(TYPE_NAME, name, kind)
    }
}

impl AnimationTarget for DemoElement {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    fn properties(&self) -> Vec<PropertyUnderTest> {
        let mut properties = vec![
            Self::property("Opacity", ValueKind::Double),
            Self::property("IsEnabled", ValueKind::Bool),
            Self::property("Columns", ValueKind::Int),
            Self::property("Margin", ValueKind::Point),
            Self::property("Background", ValueKind::Color),
            Self::property("Title", ValueKind::Text),
            Self::property("ActualWidth", ValueKind::Double).read_only(),
            Self::property("Tag", ValueKind::Text).not_animatable(),
            Self::property("Cursor", ValueKind::Other("Cursor".into())),
        ];
        if self.stale_read {
            properties.push(Self::property("CachedHeight", ValueKind::Double));
        }
        properties
    }

    fn current_value(&self, property: &PropertyUnderTest) -> Option<Value> {
        match property.name.as_str() {
            "Opacity" => Some(Value::Double(1.0)),
            "Columns" => Some(Value::Int(3)),
            "CachedHeight" => Some(Value::Double(240.0)),
            _ => None,
        }
    }

    fn read(&mut self, property: &PropertyUnderTest, clock: &mut AnimationClock) -> Result<Option<Value>> {
        if property.name == "CachedHeight" {
            return Ok(Some(Value::Double(240.0)));
        }
        Ok(Some(clock.current_value()))
    }

    fn on_frame(&mut self, property: &PropertyUnderTest, clock: &mut AnimationClock) {
        // layout consults IsEnabled every frame
        if property.name == "IsEnabled" && clock.is_active() {
            let _ = clock.current_value();
        }
    }
}
