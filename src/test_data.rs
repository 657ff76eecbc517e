#[cfg(test)]
pub const POST_DATA: &str = r##"---
title: "Hello"
slug: hello-world
summary: A first post
tags:
  - rust
  - blog
date: 2023-5-1
author:
  name: Jane Doe
  website: https://jane.example.com
---
# Hi

How to be a great software engineer?

Someone asked me this question today and I didn’t have an answer.

```rust
fn main() {
    println!("hello");
}
```
"##;

#[cfg(test)]
pub const POST_DATA_NO_FRONT_MATTER: &str = r##"# What I learned after 20+ years of software development

I will divide this in parts, non-technical and technical
"##;

#[cfg(test)]
pub fn post_with_date(slug: &str, date: &str) -> String {
    format!("---\ntitle: \"{}\"\nslug: {}\ndate: {}\n---\n# {}\n", slug, slug, date, slug)
}
