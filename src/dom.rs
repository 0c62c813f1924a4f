//! `web-sys` implementation of [`Host`], plus the event bindings of the page.
//!
//! Every lookup is guarded: a missing element is logged at debug level and the
//! effect is skipped. Map widget access goes through `Reflect` so an absent
//! property or method never throws.

use std::{rc::Rc, time::Duration};

use js_sys::{Function, Object, Reflect};
use log::{debug, warn};
use wasm_bindgen::{JsCast, JsValue, prelude::Closure};
use web_sys::{Document, Element, Event, HtmlElement, MouseEvent, MouseEventInit, Window};

use crate::{
	errors::TourError,
	host::{Effect, Host},
	model::{CameraPose, Control, MapInteraction, Page},
};

const MAP_ID: &str = "map";
const MAP_OVERLAY: &str = ".map-overlay";
const SMALL_IFRAME_CONTAINER_ID: &str = "small-iframe-container";
const SMALL_IFRAME_ID: &str = "small-iframe";
const TOUR_IFRAME_ID: &str = "matterport-iframe";
const TOUR_CONTAINER: &str = ".tour-container";
const TOP_BAR_ID: &str = "iframe-top-bar";

/// Title, subtitle and button of the map page, with their stagger.
const MAP_TITLES: [(&str, &str); 3] = [(".map-title", "0.3s"), (".map-subtitle", "0.6s"), (".explore-button", "0.9s")];

const TOP_BAR_BUTTON: &str = r#"<button id="back-to-map-from-iframe" class="back-button"><span class="back-arrow">←</span> Back to Map</button>"#;

pub struct DomHost {
	window: Window,
	document: Document,
	tour_title: String,
	/// Where the last synthetic press landed, for the matching release.
	press_at: Option<(f64, f64)>,
}

impl DomHost {
	pub fn new(window: Window, tour_title: &str) -> Result<Self, TourError> {
		let document = window.document().ok_or_else(|| TourError::MissingElement("document".into()))?;
		Ok(Self {
			window,
			document,
			tour_title: tour_title.to_owned(),
			press_at: None,
		})
	}

	fn by_id(&self, id: &str) -> Option<Element> {
		let found = self.document.get_element_by_id(id);
		if found.is_none() {
			debug!("#{} not found, skipping", id);
		}
		found
	}

	fn query(&self, selector: &str) -> Option<Element> {
		let found = self.document.query_selector(selector).ok().flatten();
		if found.is_none() {
			debug!("{} not found, skipping", selector);
		}
		found
	}

	fn require(&self, id: &str) -> Result<Element, TourError> {
		self.document.get_element_by_id(id).ok_or_else(|| TourError::MissingElement(id.to_owned()))
	}

	fn top_bar(&self) -> Option<HtmlElement> {
		if let Some(bar) = self.document.get_element_by_id(TOP_BAR_ID) {
			return bar.dyn_into().ok();
		}
		let container = self.by_id(SMALL_IFRAME_CONTAINER_ID)?;
		let bar = self.document.create_element("div").ok()?;
		bar.set_id(TOP_BAR_ID);
		bar.set_class_name("iframe-top-bar");
		bar.set_inner_html(TOP_BAR_BUTTON);
		let title = self.document.create_element("h3").ok()?;
		title.set_class_name("tour-title");
		title.set_text_content(Some(&self.tour_title));
		bar.append_child(&title).ok()?;
		container.append_child(&bar).ok()?;
		bar.dyn_into().ok()
	}

	fn mouse_event(&self, kind: &str, x: f64, y: f64, buttons: u16) -> Result<MouseEvent, TourError> {
		let init = MouseEventInit::new();
		init.set_bubbles(true);
		init.set_cancelable(true);
		init.set_view(Some(&self.window));
		init.set_client_x(x as i32);
		init.set_client_y(y as i32);
		init.set_screen_x(x as i32);
		init.set_screen_y(y as i32);
		init.set_button(0);
		init.set_buttons(buttons);
		MouseEvent::new_with_mouse_event_init_dict(kind, &init).map_err(js_error)
	}
}

impl Host for DomHost {
	fn apply(&mut self, effect: Effect) {
		match effect {
			Effect::PageExit(page) => add_class(self.by_id(page.element_id()), "blur-out"),
			Effect::PageRestore(page) => remove_classes(self.by_id(page.element_id()), &["blur-out"]),
			Effect::PageDeactivate(page) => remove_classes(self.by_id(page.element_id()), &["active", "blur-out"]),
			Effect::PageActivate(page) => add_class(self.by_id(page.element_id()), "active"),
			Effect::MapBlur => {
				remove_classes(self.by_id(MAP_ID), &["unblurred"]);
				remove_classes(self.query(MAP_OVERLAY), &["fade-out"]);
			},
			Effect::MapUnblur => {
				add_class(self.by_id(MAP_ID), "unblurred");
				add_class(self.query(MAP_OVERLAY), "fade-out");
			},
			Effect::MapTitlesClear => {
				for (selector, _) in MAP_TITLES {
					let Some(el) = self.query(selector).and_then(|el| el.dyn_into::<HtmlElement>().ok()) else {
						continue;
					};
					set_html_style(&el, &[("animation", "none")]);
					// reading layout forces a reflow so the animation restarts
					let _ = el.offset_height();
					if let Err(err) = el.style().remove_property("animation") {
						debug!("could not restart animation on {}: {:?}", selector, err);
					}
				}
			},
			Effect::MapTitlesAnimate => {
				for (selector, delay) in MAP_TITLES {
					let animation = format!("fadeInUp 0.8s ease-out {} forwards", delay);
					set_style(self.query(selector), &[("animation", animation.as_str())]);
				}
			},
			Effect::TourContainerHide => {
				set_style(self.query(TOUR_CONTAINER), &[("opacity", "0"), ("transform", "translateY(20px)")]);
			},
			Effect::TourContainerFadeIn => set_style(self.query(TOUR_CONTAINER), &[
				("transition", "all 0.6s ease-out"),
				("opacity", "1"),
				("transform", "translateY(0)"),
			]),
			Effect::TourIframeReveal => set_style(self.by_id(TOUR_IFRAME_ID), &[("opacity", "1")]),
			Effect::IframeShow => {
				add_class(self.by_id(SMALL_IFRAME_CONTAINER_ID), "show");
				if let Some(frame) = self.by_id(SMALL_IFRAME_ID) {
					if let Err(err) = frame.set_attribute("tabindex", "0") {
						debug!("tour frame not made focusable: {:?}", err);
					}
				}
			},
			Effect::IframeHide => remove_classes(self.by_id(SMALL_IFRAME_CONTAINER_ID), &["show"]),
			Effect::IframeExpand => add_class(self.by_id(SMALL_IFRAME_CONTAINER_ID), "expand"),
			Effect::IframeShrink => remove_classes(self.by_id(SMALL_IFRAME_CONTAINER_ID), &["expand"]),
			Effect::PageBlur => set_style(self.by_id(Page::Map.element_id()), &[("filter", "blur(100px)"), ("transition", "filter 0.8s ease-out")]),
			Effect::PageUnblur => set_style(self.by_id(Page::Map.element_id()), &[("filter", "none")]),
			Effect::TopBarShow => {
				if let Some(bar) = self.top_bar() {
					set_html_style(&bar, &[("opacity", "0"), ("transform", "translateY(-20px)"), ("display", "block")]);
				}
			},
			Effect::TopBarSlideIn => set_style(self.by_id(TOP_BAR_ID), &[
				("transition", "all 0.5s ease-out"),
				("opacity", "1"),
				("transform", "translateY(0)"),
			]),
			Effect::TopBarHide => set_style(self.by_id(TOP_BAR_ID), &[
				("transition", "all 0.3s ease-out"),
				("opacity", "0"),
				("transform", "translateY(-20px)"),
			]),
			Effect::TopBarRemove => set_style(self.by_id(TOP_BAR_ID), &[("display", "none")]),
		}
	}

	fn can_fly(&mut self) -> bool {
		self.document
			.get_element_by_id(MAP_ID)
			.and_then(|map| Reflect::get(&map, &"flyCameraTo".into()).ok())
			.is_some_and(|fly| fly.is_function())
	}

	fn fly_camera_to(&mut self, pose: &CameraPose, duration: Duration) -> Result<(), TourError> {
		let map = self.require(MAP_ID)?;
		let fly = Reflect::get(&map, &"flyCameraTo".into())
			.map_err(js_error)?
			.dyn_into::<Function>()
			.map_err(|_| TourError::MissingCapability("flyCameraTo"))?;

		let options = Object::new();
		set(&options, "endCamera", &camera_object(pose)?)?;
		set(&options, "durationMillis", &JsValue::from_f64(duration.as_millis() as f64))?;
		fly.call1(&map, &options).map_err(js_error)?;
		Ok(())
	}

	fn set_camera(&mut self, pose: &CameraPose) -> Result<(), TourError> {
		let map = self.require(MAP_ID)?;
		set(&map, "center", &center_object(pose)?)?;
		set(&map, "tilt", &JsValue::from_f64(pose.tilt))?;
		set(&map, "range", &JsValue::from_f64(pose.range))?;
		set(&map, "heading", &JsValue::from_f64(pose.heading))?;
		Ok(())
	}

	fn set_map_interaction(&mut self, interaction: &MapInteraction) -> Result<(), TourError> {
		let map = self.require(MAP_ID)?;
		set(&map, "draggable", &JsValue::from_bool(interaction.draggable))?;
		set(&map, "scrollwheel", &JsValue::from_bool(interaction.scrollwheel))?;
		set(&map, "disableDoubleClickZoom", &JsValue::from_bool(interaction.disable_double_click_zoom))?;
		set(&map, "disableKeyboardShortcuts", &JsValue::from_bool(interaction.disable_keyboard_shortcuts))?;
		Ok(())
	}

	fn iframe_focused(&mut self) -> bool {
		match (self.document.active_element(), self.document.get_element_by_id(SMALL_IFRAME_ID)) {
			(Some(active), Some(frame)) => Object::is(&active, &frame),
			_ => false,
		}
	}

	fn recreate_iframe(&mut self, src: &str, allow: &str) -> Result<(), TourError> {
		let old = self.require(SMALL_IFRAME_ID)?;
		let parent = old.parent_node().ok_or_else(|| TourError::MissingElement(format!("{} parent", SMALL_IFRAME_ID)))?;

		let fresh = self.document.create_element("iframe").map_err(js_error)?;
		fresh.set_id(SMALL_IFRAME_ID);
		fresh.set_class_name(&old.class_name());
		fresh.set_attribute("src", src).map_err(js_error)?;
		fresh.set_attribute("allow", allow).map_err(js_error)?;
		fresh.set_attribute("allowfullscreen", "").map_err(js_error)?;
		fresh.set_attribute("frameborder", "0").map_err(js_error)?;
		parent.replace_child(&fresh, &old).map_err(js_error)?;
		debug!("tour frame recreated");
		Ok(())
	}

	fn simulate_center_click(&mut self) -> Result<(), TourError> {
		let frame: HtmlElement = self
			.require(TOUR_IFRAME_ID)?
			.dyn_into()
			.map_err(|_| TourError::MissingElement(TOUR_IFRAME_ID.into()))?;

		let rect = frame.get_bounding_client_rect();
		let x = rect.left() + rect.width() / 2.0;
		let y = rect.top() + rect.height() / 2.0;
		debug!("tour frame {}x{}, centre at ({}, {})", rect.width(), rect.height(), x, y);

		let click = self.mouse_event("click", x, y, 1)?;
		frame.dispatch_event(&click).map_err(cross_origin)?;
		if let Some(parent) = frame.parent_element() {
			parent.dispatch_event(&click).map_err(cross_origin)?;
		}
		if let Some(under) = self.document.element_from_point(x as f32, y as f32) {
			debug!("element at centre: <{}>", under.tag_name().to_lowercase());
			under.dispatch_event(&click).map_err(cross_origin)?;
		}
		frame.focus().map_err(cross_origin)?;
		frame.click();

		let press = self.mouse_event("mousedown", x, y, 1)?;
		frame.dispatch_event(&press).map_err(cross_origin)?;
		self.press_at = Some((x, y));
		Ok(())
	}

	fn release_center_click(&mut self) -> Result<(), TourError> {
		let Some((x, y)) = self.press_at.take() else { return Ok(()) };
		let frame = self.require(TOUR_IFRAME_ID)?;
		let release = self.mouse_event("mouseup", x, y, 0)?;
		frame.dispatch_event(&release).map_err(cross_origin)?;
		Ok(())
	}

	fn reload(&mut self) {
		if let Err(err) = self.window.location().reload() {
			warn!("page reload failed: {:?}", err);
		}
	}
}

// ---------------------------------------------------------------------------
// Event bindings
// ---------------------------------------------------------------------------

/// Route clicks on the control elements, and contact form submits, to
/// `on_control`. A single delegated listener also covers the top bar button,
/// which only exists once the hand-off has run.
pub fn bind_controls(document: &Document, on_control: impl Fn(Control) + 'static) -> Result<(), TourError> {
	let on_control = Rc::new(on_control);

	let click = {
		let on_control = on_control.clone();
		Closure::<dyn FnMut(Event)>::new(move |event: Event| {
			let Some(target) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else { return };
			if let Some(control) = clicked_control(&target) {
				on_control(control);
			}
		})
	};
	document
		.add_event_listener_with_callback("click", click.as_ref().unchecked_ref())
		.map_err(js_error)?;
	click.forget();

	let submit = Closure::<dyn FnMut(Event)>::new(move |event: Event| {
		let Some(form) = event.target().and_then(|t| t.dyn_into::<Element>().ok()) else { return };
		if form.id() == Control::SubmitContact.element_id() {
			on_control(Control::SubmitContact);
		}
	});
	document
		.add_event_listener_with_callback("submit", submit.as_ref().unchecked_ref())
		.map_err(js_error)?;
	submit.forget();
	Ok(())
}

fn clicked_control(target: &Element) -> Option<Control> {
	let selector = Control::ALL
		.into_iter()
		.filter(|control| *control != Control::SubmitContact)
		.map(|control| format!("#{}", control.element_id()))
		.collect::<Vec<_>>()
		.join(", ");
	let found = target.closest(&selector).ok().flatten()?;
	Control::from_element_id(&found.id())
}

/// Lift every button slightly while hovered.
pub fn bind_hover_lift(document: &Document) -> Result<(), TourError> {
	let buttons = document.query_selector_all("button").map_err(js_error)?;
	for i in 0..buttons.length() {
		let Some(button) = buttons.get(i).and_then(|node| node.dyn_into::<HtmlElement>().ok()) else {
			continue;
		};
		for (event, transform) in [("mouseenter", "translateY(-2px) scale(1.02)"), ("mouseleave", "translateY(0) scale(1)")] {
			let target = button.clone();
			let listener = Closure::<dyn FnMut()>::new(move || {
				set_html_style(&target, &[("transform", transform)]);
			});
			button
				.add_event_listener_with_callback(event, listener.as_ref().unchecked_ref())
				.map_err(js_error)?;
			listener.forget();
		}
	}
	Ok(())
}

/// Drift the decorative `.shape` elements with the pointer.
pub fn bind_parallax(window: &Window, document: &Document) -> Result<(), TourError> {
	let win = window.clone();
	let doc = document.clone();
	let listener = Closure::<dyn FnMut(MouseEvent)>::new(move |event: MouseEvent| {
		let width = win.inner_width().ok().and_then(|w| w.as_f64()).unwrap_or(1.0).max(1.0);
		let height = win.inner_height().ok().and_then(|h| h.as_f64()).unwrap_or(1.0).max(1.0);
		let x = f64::from(event.client_x()) / width;
		let y = f64::from(event.client_y()) / height;

		let Ok(shapes) = doc.query_selector_all(".shape") else { return };
		for i in 0..shapes.length() {
			let Some(shape) = shapes.get(i).and_then(|node| node.dyn_into::<HtmlElement>().ok()) else {
				continue;
			};
			let (dx, dy) = parallax_offset(i, x, y);
			set_html_style(&shape, &[("transform", format!("translate({}px, {}px)", dx, dy).as_str())]);
		}
	});
	document
		.add_event_listener_with_callback("mousemove", listener.as_ref().unchecked_ref())
		.map_err(js_error)?;
	listener.forget();
	Ok(())
}

/// Offset of the `index`-th shape for a pointer at (`x`, `y`), both given as
/// fractions of the viewport. Later shapes move faster.
pub fn parallax_offset(index: u32, x: f64, y: f64) -> (f64, f64) {
	let speed = (f64::from(index) + 1.0) * 0.5;
	((x - 0.5) * speed * 20.0, (y - 0.5) * speed * 20.0)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn js_error(err: JsValue) -> TourError {
	TourError::Js(format!("{:?}", err))
}

fn cross_origin(err: JsValue) -> TourError {
	TourError::CrossOrigin(format!("{:?}", err))
}

fn add_class(el: Option<Element>, class: &str) {
	if let Some(el) = el {
		if let Err(err) = el.class_list().add_1(class) {
			debug!("could not add .{}: {:?}", class, err);
		}
	}
}

fn remove_classes(el: Option<Element>, classes: &[&str]) {
	if let Some(el) = el {
		for class in classes {
			if let Err(err) = el.class_list().remove_1(class) {
				debug!("could not remove .{}: {:?}", class, err);
			}
		}
	}
}

fn set_style(el: Option<Element>, props: &[(&str, &str)]) {
	if let Some(el) = el.and_then(|el| el.dyn_into::<HtmlElement>().ok()) {
		set_html_style(&el, props);
	}
}

fn set_html_style(el: &HtmlElement, props: &[(&str, &str)]) {
	let style = el.style();
	for (name, value) in props {
		if let Err(err) = style.set_property(name, value) {
			debug!("could not set {}: {:?}", name, err);
		}
	}
}

fn set(target: &JsValue, key: &str, value: &JsValue) -> Result<(), TourError> {
	Reflect::set(target, &JsValue::from_str(key), value).map_err(js_error)?;
	Ok(())
}

fn center_object(pose: &CameraPose) -> Result<JsValue, TourError> {
	let center = Object::new();
	set(&center, "lat", &JsValue::from_f64(pose.lat))?;
	set(&center, "lng", &JsValue::from_f64(pose.lng))?;
	set(&center, "altitude", &JsValue::from_f64(pose.altitude))?;
	Ok(center.into())
}

fn camera_object(pose: &CameraPose) -> Result<JsValue, TourError> {
	let camera = Object::new();
	set(&camera, "center", &center_object(pose)?)?;
	set(&camera, "tilt", &JsValue::from_f64(pose.tilt))?;
	set(&camera, "range", &JsValue::from_f64(pose.range))?;
	set(&camera, "heading", &JsValue::from_f64(pose.heading))?;
	Ok(camera.into())
}
