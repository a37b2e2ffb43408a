/*!

This is the long-form manual for `dot_layout` and `dotmatrix`.

## Overview

A dot-matrix chart shows every respondent of a survey as one dot. The dots are grouped by
wave (survey administration), by party and by response. `dot_layout` computes where every dot
goes, once, at build time. The rendering client only reads the precomputed coordinates.

For one characteristic and one breakpoint the computation runs in three steps:

1. *Apportionment* ([`crate::add_counts`]): the proportions of the responses of a split are
   turned into integer counts that sum to the sample size of the split, by largest remainder.
2. *Segments* ([`crate::add_segments`]): the split gets a rectangle on the canvas, which is
   shared by its responses left to right, each as wide as its proportion.
3. *Packing* ([`crate::point_positions`]): the dots of a response are placed inside its
   rectangle.

[`crate::build_coordinates`] runs these steps for all the splits of a characteristic.

## Canvas geometry

The canvas is `vizWidth` wide and `labelHeight + numWaves * (labelHeight + waveHeight)` high.
Every wave has a label strip, then a band of height `waveHeight`:

```text
 y = 0            +-------------------------------------------+
                  | label                                     |
 y = L            +-------------------------------------------+
                  | wave 0                                    |
 y = L + W        +-------------------------------------------+
                  | label                                     |
 y = 2L + W       +-------------------------------------------+
                  | wave 1                                    |
                  +-------------------------------------------+
```

A split not broken out by wave spans from `y = labelHeight` to the bottom of the canvas. A
split broken out by party occupies one of `numParties` equal columns separated by `partyGap`:
the column of party `i` starts at `i * (columnWidth + partyGap)`. A split not broken out by
party spans the full width.

Inside its rectangle, a split lays out its responses with `responseGap` between them. The
width left once the gaps are removed is shared in proportion to the responses.

The `expanded` and `collapsed` groupings of a split use the same rectangle.

## Sample sizes

The sample size of the configuration is the number of respondents in one (wave, party) cell.
A split not broken out by wave holds the respondents of every wave, and likewise for parties:

| wave    | party   | respondents                          |
|---------|---------|--------------------------------------|
| set     | set     | `sample_size`                        |
| set     | null    | `sample_size * numParties`           |
| null    | set     | `sample_size * numWaves`             |
| null    | null    | `sample_size * numWaves * numParties`|

The unsplit positions hold all the respondents of the characteristic, packed over the whole
canvas, label strips included.

## Packing

The rectangle is divided into a grid of windows, each at least one dot wide. Starting from the
densest such grid, rows and columns are removed alternately (columns first) as long as enough
windows remain. Every dot is placed at a random position in its window, so dots never overlap.
When there are more windows than dots, the empty windows are drawn uniformly at random.

When even the densest grid is too small, the dots are placed at the centers of a square grid
of `ceil(sqrt(n))` windows per side. These dots overlap, and the segment carries
`error: true`. No dot is ever dropped.

## Randomness

All the functions that place dots take the random source as a parameter. `dotmatrix --seed`
derives one generator per (dimension, characteristic, breakpoint) with [`crate::unit_rng`],
which makes a build reproducible.

## Build inputs

`dotmatrix` reads a visualization configuration:

```json
{
  "sample_size": 100,
  "layouts": [
    {
      "breakpoint": "small",
      "screenWidthRange": [0, 768],
      "vizWidth": 340,
      "waveHeight": 300,
      "labelHeight": 40,
      "responseGap": 6,
      "partyGap": 12,
      "pointRadius": 1.5
    }
  ]
}
```

and one metadata file per dimension (importance, performance), as JSON, gzip or zip:

```json
{
  "characteristics": [
    {
      "characteristic_name": "free_elections",
      "col_idx": 12,
      "in_waves": [1, 2],
      "splits": [
        { "wave": null, "party": null, "responses": { "expanded": [], "collapsed": [] } }
      ]
    }
  ],
  "response": { "response_groups": { "expanded": [["Very important", ["5"]]], "collapsed": [] } },
  "pid3": { "col_idx": 3, "vals": ["1", "2", "3"], "response_groups": [["Democrat", ["1"]]] },
  "wave": { "col_idx": 2, "vals": [1, 2], "response_groups": [], "dates": [[1, "Oct 2017"], [2, "Mar 2018"]] },
  "weight": { "col_idx": 4 }
}
```

## Build outputs

Every unit is written to `<out>/<imp|perf>/<characteristic>/<breakpoint>.gz`. The file
`<out>/manifest.json` lists the breakpoints built for every characteristic and dimension, the
expanded to collapsed response group mapping and the wave labels.

*/
