//! # Clock Face Rendering
//!
//! This module builds the widget's visual tree and keeps it up to date. The tree
//! is a small DOM-like structure ([`Node`]) that host surfaces turn into
//! pixels or text: the ASCII renderer here, the bitmap renderer in
//! [`crate::eink_renderer`], or JSON for anything else.
//!
//! Two update paths exist:
//! - **Full render** rebuilds the tree, including the sun/moon chips and their
//!   icon animations. Used on the first tick and when the date changes.
//! - **Incremental update** ([`Renderer::patch_time`]) rewrites the text of the
//!   hour/minute/second/period nodes in place and leaves animations running.
//!
//! ## Animation players
//! Chip icons are looping animations owned by an [`AnimationProvider`]. Players
//! are keyed by `{instance}-{animation}`; loading a key that already has a player
//! destroys the old one first, so there is never more than one player per key.
//! Players whose chip disappears from a new render are destroyed as well.

use crate::formatter::TimeParts;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace};

/// Value shown in chips when no coordinates are configured
pub const SET_COORDINATES: &str = "Set latitude/longitude";
pub const MOON_UP_ALL_DAY: &str = "Up all day";
pub const MOON_BELOW_HORIZON: &str = "Below horizon";

/// One element of the visual tree.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub tag: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub class: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    /// Animation playing inside this node, if it is an icon container
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Node>,
}

impl Node {
    pub fn new(tag: &'static str, class: &str) -> Self {
        Node {
            tag,
            id: None,
            class: class.to_string(),
            text: String::new(),
            animation: None,
            children: Vec::new(),
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = text.into();
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn push(&mut self, child: Node) {
        self.children.push(child);
    }

    pub fn has_class(&self, class: &str) -> bool {
        self.class.split_whitespace().any(|c| c == class)
    }

    /// First node (depth-first, self included) carrying `class`.
    pub fn find_by_class(&self, class: &str) -> Option<&Node> {
        if self.has_class(class) {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find_by_class(class))
    }

    pub fn find_by_class_mut(&mut self, class: &str) -> Option<&mut Node> {
        if self.has_class(class) {
            return Some(self);
        }
        self.children
            .iter_mut()
            .find_map(|c| c.find_by_class_mut(class))
    }

    /// All nodes carrying `class`, in document order.
    pub fn find_all_by_class<'a>(&'a self, class: &str, out: &mut Vec<&'a Node>) {
        if self.has_class(class) {
            out.push(self);
        }
        for child in &self.children {
            child.find_all_by_class(class, out);
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text_content(&self) -> String {
        let mut text = self.text.clone();
        for child in &self.children {
            text.push_str(&child.text_content());
        }
        text
    }
}

/// Handle to a running icon animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct PlayerHandle(pub u64);

/// Capability contract for looping icon animations.
pub trait AnimationProvider {
    /// Start a looping animation named `animation` inside `container_id`.
    fn load(&mut self, container_id: &str, animation: &str) -> PlayerHandle;

    /// Stop and release a player.
    fn destroy(&mut self, player: PlayerHandle);
}

/// Default provider: text surfaces draw a static glyph, so "playing" only
/// tracks which players are alive.
#[derive(Debug, Default)]
pub struct StaticIcons {
    next: u64,
    live: HashSet<PlayerHandle>,
}

impl StaticIcons {
    pub fn live_players(&self) -> usize {
        self.live.len()
    }
}

impl AnimationProvider for StaticIcons {
    fn load(&mut self, container_id: &str, animation: &str) -> PlayerHandle {
        self.next += 1;
        let handle = PlayerHandle(self.next);
        trace!(
            "Loading animations/{}.json into #{} as player {}",
            animation,
            container_id,
            handle.0
        );
        self.live.insert(handle);
        handle
    }

    fn destroy(&mut self, player: PlayerHandle) {
        self.live.remove(&player);
    }
}

/// Sun row contents.
#[derive(Debug, Clone, PartialEq)]
pub enum SunRow {
    /// No coordinates configured
    Unavailable,
    Times { sunrise: String, sunset: String },
}

/// Moon row contents. The "always" variants win over timestamps.
#[derive(Debug, Clone, PartialEq)]
pub enum MoonRow {
    Unavailable,
    AlwaysUp,
    AlwaysDown,
    Times { rise: String, set: String },
}

/// Everything a full render needs.
#[derive(Debug, Clone, PartialEq)]
pub struct ClockView {
    pub parts: TimeParts,
    pub show_time: bool,
    /// Date row text, `None` when the row is hidden
    pub date: Option<String>,
    /// `None` when the row is hidden
    pub sun: Option<SunRow>,
    pub moon: Option<MoonRow>,
}

/// Builds and patches the visual tree for one widget instance.
pub struct Renderer {
    instance_id: String,
    root_id: String,
    animations: Box<dyn AnimationProvider>,
    players: HashMap<String, PlayerHandle>,
    tree: Option<Node>,
    show_time: bool,
}

impl Renderer {
    pub fn new(instance_id: &str, animations: Box<dyn AnimationProvider>) -> Self {
        Self {
            instance_id: instance_id.to_string(),
            root_id: format!("glass-clock-{instance_id}"),
            animations,
            players: HashMap::new(),
            tree: None,
            show_time: true,
        }
    }

    pub fn root_id(&self) -> &str {
        &self.root_id
    }

    /// The current tree, if a full render has happened.
    pub fn tree(&self) -> Option<&Node> {
        self.tree.as_ref()
    }

    /// Number of animation players currently held.
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Rebuild the whole tree from `view`.
    pub fn render(&mut self, view: &ClockView) -> &Node {
        let mut used = HashSet::new();

        let mut wrapper = Node::new("div", "glass-clock").with_id(self.root_id.clone());
        let mut card = Node::new("div", "glass-clock-card");

        if view.show_time {
            card.push(time_row(&view.parts));
        }
        if let Some(date) = &view.date {
            card.push(Node::new("div", "glass-clock-date").with_text(date.clone()));
        }

        let mut meta = Node::new("div", "glass-clock-meta");
        if let Some(sun) = &view.sun {
            meta.push(self.sun_row(sun, &mut used));
        }
        if let Some(moon) = &view.moon {
            meta.push(self.moon_row(moon, &mut used));
        }
        if !meta.children.is_empty() {
            card.push(meta);
        }

        wrapper.push(card);
        self.release_unused(&used);
        self.show_time = view.show_time;
        debug!(
            "Full render of #{} ({} animation players)",
            self.root_id,
            self.players.len()
        );
        self.tree.insert(wrapper)
    }

    /// Rewrite the time text in place. Returns false when there is nothing to patch.
    pub fn patch_time(&mut self, parts: &TimeParts) -> bool {
        if !self.show_time {
            return false;
        }
        let Some(root) = self.tree.as_mut() else {
            return false;
        };

        if let Some(node) = root.find_by_class_mut("clock-hours") {
            node.text.clone_from(&parts.hours);
        }
        if let Some(node) = root.find_by_class_mut("clock-minutes") {
            node.text.clone_from(&parts.minutes);
        }
        if !parts.seconds.is_empty() {
            if let Some(node) = root.find_by_class_mut("clock-seconds") {
                node.text.clone_from(&parts.seconds);
            }
        }
        if let Some(node) = root.find_by_class_mut("clock-period") {
            node.text.clone_from(&parts.period);
        }
        true
    }

    /// Destroy every animation player. Used when the widget goes away.
    pub fn release_players(&mut self) {
        for (_, player) in self.players.drain() {
            self.animations.destroy(player);
        }
    }

    fn sun_row(&mut self, sun: &SunRow, used: &mut HashSet<String>) -> Node {
        let mut row = Node::new("div", "glass-clock-row");
        match sun {
            SunRow::Unavailable => {
                row.push(self.chip("Sunrise", SET_COORDINATES, "glass-chip-muted", None, used));
            }
            SunRow::Times { sunrise, sunset } => {
                row.push(self.chip("Sunrise", sunrise, "sunrise", Some("sunrise"), used));
                row.push(self.chip("Sunset", sunset, "sunset", Some("sunset"), used));
            }
        }
        row
    }

    fn moon_row(&mut self, moon: &MoonRow, used: &mut HashSet<String>) -> Node {
        let mut row = Node::new("div", "glass-clock-row");
        match moon {
            MoonRow::Unavailable => {
                row.push(self.chip("Moonrise", SET_COORDINATES, "glass-chip-muted", None, used));
            }
            MoonRow::AlwaysUp => row.push(self.chip("Moon", MOON_UP_ALL_DAY, "moon", None, used)),
            MoonRow::AlwaysDown => {
                row.push(self.chip("Moon", MOON_BELOW_HORIZON, "moon", None, used))
            }
            MoonRow::Times { rise, set } => {
                row.push(self.chip("Moonrise", rise, "moon", Some("moonrise"), used));
                row.push(self.chip("Moonset", set, "moon", Some("moonset"), used));
            }
        }
        row
    }

    fn chip(
        &mut self,
        label: &str,
        value: &str,
        extra_class: &str,
        animation: Option<&str>,
        used: &mut HashSet<String>,
    ) -> Node {
        let class = format!("glass-chip {extra_class}");
        let mut chip = Node::new("div", class.trim());

        if let Some(name) = animation {
            let container_id = format!("{}-icon-{}", self.root_id, name);
            let mut icon = Node::new("div", "glass-chip-icon").with_id(container_id.clone());
            icon.animation = Some(name.to_string());
            used.insert(self.load_animation(&container_id, name));
            chip.push(icon);
        }

        let mut content = Node::new("div", "glass-chip-content");
        content.push(Node::new("div", "glass-chip-label").with_text(label));
        content.push(Node::new("div", "glass-chip-value").with_text(value));
        chip.push(content);
        chip
    }

    /// Start `animation`, replacing any player already registered under its key.
    fn load_animation(&mut self, container_id: &str, animation: &str) -> String {
        let key = format!("{}-{}", self.instance_id, animation);
        if let Some(previous) = self.players.remove(&key) {
            self.animations.destroy(previous);
        }
        let player = self.animations.load(container_id, animation);
        self.players.insert(key.clone(), player);
        key
    }

    fn release_unused(&mut self, used: &HashSet<String>) {
        let stale: Vec<String> = self
            .players
            .keys()
            .filter(|key| !used.contains(*key))
            .cloned()
            .collect();
        for key in stale {
            if let Some(player) = self.players.remove(&key) {
                self.animations.destroy(player);
            }
        }
    }
}

fn time_row(parts: &TimeParts) -> Node {
    let mut row = Node::new("div", "glass-clock-time");
    row.push(Node::new("span", "clock-hours").with_text(parts.hours.clone()));
    row.push(Node::new("span", "clock-separator").with_text(":"));
    row.push(Node::new("span", "clock-minutes").with_text(parts.minutes.clone()));
    if !parts.seconds.is_empty() {
        row.push(Node::new("span", "clock-seconds").with_text(parts.seconds.clone()));
    }
    if !parts.period.is_empty() {
        row.push(Node::new("span", "clock-period").with_text(parts.period.clone()));
    }
    row
}

/// Glyph standing in for an animation on text surfaces.
pub fn icon_glyph(animation: &str) -> &'static str {
    match animation {
        "sunrise" | "sunset" => "☀",
        "moonrise" | "moonset" => "☾",
        _ => "•",
    }
}

/// Clock line as text: "09:41:07 am".
pub fn time_line(time_row: &Node) -> String {
    let text = |class: &str| {
        time_row
            .find_by_class(class)
            .map(|n| n.text.clone())
            .unwrap_or_default()
    };
    let mut line = format!("{}:{}", text("clock-hours"), text("clock-minutes"));
    let seconds = text("clock-seconds");
    if !seconds.is_empty() {
        line.push(':');
        line.push_str(&seconds);
    }
    let period = text("clock-period");
    if !period.is_empty() {
        line.push(' ');
        line.push_str(&period);
    }
    line
}

/// One chip as text: "☀ Sunrise 6:12 am".
pub fn chip_line(chip: &Node) -> String {
    let label = chip
        .find_by_class("glass-chip-label")
        .map(|n| n.text.as_str())
        .unwrap_or_default();
    let value = chip
        .find_by_class("glass-chip-value")
        .map(|n| n.text.as_str())
        .unwrap_or_default();
    match chip
        .find_by_class("glass-chip-icon")
        .and_then(|n| n.animation.as_deref())
    {
        Some(name) => format!("{} {} {}", icon_glyph(name), label, value),
        None if chip.has_class("glass-chip-muted") => format!("· {label}: {value}"),
        None => format!("{label} {value}"),
    }
}

/// Text lines of the card body: time, date, then one line per chip row.
pub fn content_lines(tree: &Node) -> Vec<String> {
    let mut lines = Vec::new();
    if let Some(row) = tree.find_by_class("glass-clock-time") {
        lines.push(time_line(row));
    }
    if let Some(date) = tree.find_by_class("glass-clock-date") {
        lines.push(date.text.clone());
    }
    if let Some(meta) = tree.find_by_class("glass-clock-meta") {
        for row in &meta.children {
            let chips: Vec<String> = row.children.iter().map(chip_line).collect();
            lines.push(chips.join("  │  "));
        }
    }
    lines
}

/// Render the tree as a boxed card for terminals.
pub fn ascii_lines(tree: &Node) -> Vec<String> {
    let content = content_lines(tree);
    let width = content
        .iter()
        .map(|l| l.chars().count())
        .max()
        .unwrap_or(0);

    let mut lines = Vec::with_capacity(content.len() + 2);
    lines.push(format!("╭{}╮", "─".repeat(width + 2)));
    for line in &content {
        let pad = width - line.chars().count();
        lines.push(format!("│ {}{} │", line, " ".repeat(pad)));
    }
    lines.push(format!("╰{}╯", "─".repeat(width + 2)));
    lines
}

/// Print the tree to stdout.
pub fn draw_ascii(tree: &Node) {
    for line in ascii_lines(tree) {
        println!("{}", line);
    }
}
